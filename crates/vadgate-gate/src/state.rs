use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use vadgate_codec::EncodedPacket;

use crate::config::GateConfig;

/// Accumulated times are sums of f32 frame durations; a tenth of a percent of
/// one 10ms frame absorbs the rounding without ever spanning a whole frame.
const TIME_EPSILON: f32 = 1e-4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatePhase {
    Idle,
    Attacking,
    Speaking,
    Releasing,
}

/// Notifications raised by gate transitions, in the order they occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateEvent {
    SoundStart,
    SpeechStart,
    SpeechEnd,
    SoundEnd,
}

/// Result of feeding one packet through the gate.
#[derive(Debug, Default)]
pub struct GateOutput {
    /// Packets to forward to the transport, in capture order. Empty while the
    /// gate is closed; the pre-roll flush arrives here on the transition to
    /// Speaking.
    pub packets: Vec<EncodedPacket>,
    /// Send the zero-length end-of-utterance marker after the packets.
    pub end_of_utterance: bool,
    pub events: Vec<GateEvent>,
}

/// Attack/release hysteresis state machine.
///
/// While closed, packets accumulate in a bounded pre-roll FIFO capped at
/// `preattack_duration` seconds, oldest evicted first. The attack must be
/// contiguous: one sub-threshold frame zeroes the attack counter. While open,
/// every packet is forwarded; in non-continuous mode, once sub-threshold
/// audio accumulates past the release time the gate closes and drops the
/// triggering packet.
pub struct VadGate {
    cfg: GateConfig,
    phase: GatePhase,
    attack_time: f32,
    release_time: f32,
    preroll: VecDeque<EncodedPacket>,
    preroll_secs: f32,
    fired_sound_start: bool,
    speaking: Arc<AtomicBool>,
}

impl VadGate {
    pub fn new(cfg: GateConfig) -> Self {
        Self {
            cfg,
            phase: GatePhase::Idle,
            attack_time: 0.0,
            release_time: 0.0,
            preroll: VecDeque::new(),
            preroll_secs: 0.0,
            fired_sound_start: false,
            speaking: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn phase(&self) -> GatePhase {
        self.phase
    }

    /// Shared flag the coordinator reads to decide transport-driven
    /// auto-stop; true exactly while the gate is open.
    pub fn speaking_handle(&self) -> Arc<AtomicBool> {
        self.speaking.clone()
    }

    pub fn process(&mut self, packet: EncodedPacket) -> GateOutput {
        let mut out = GateOutput::default();
        match self.phase {
            GatePhase::Idle | GatePhase::Attacking => self.process_closed(packet, &mut out),
            GatePhase::Speaking | GatePhase::Releasing => self.process_open(packet, &mut out),
        }
        out
    }

    fn process_closed(&mut self, packet: EncodedPacket, out: &mut GateOutput) {
        let vad = packet.vad_probability;
        let duration = packet.duration;

        self.preroll_secs += duration;
        self.preroll.push_back(packet);
        while self.preroll_secs > self.cfg.preattack_duration + TIME_EPSILON {
            if let Some(evicted) = self.preroll.pop_front() {
                self.preroll_secs -= evicted.duration;
            } else {
                break;
            }
        }

        if vad >= self.cfg.attack_threshold {
            if !self.fired_sound_start {
                self.fired_sound_start = true;
                out.events.push(GateEvent::SoundStart);
            }
            self.phase = GatePhase::Attacking;
            self.attack_time += duration;
            if self.attack_time + TIME_EPSILON >= self.cfg.attack_time_threshold {
                tracing::debug!(
                    "Gate opening after {:.0}ms contiguous attack, flushing {:.0}ms of pre-roll",
                    self.attack_time * 1000.0,
                    self.preroll_secs * 1000.0
                );
                self.phase = GatePhase::Speaking;
                self.speaking.store(true, Ordering::SeqCst);
                self.attack_time = 0.0;
                self.release_time = 0.0;
                out.packets.extend(self.preroll.drain(..));
                self.preroll_secs = 0.0;
                out.events.push(GateEvent::SpeechStart);
            }
        } else {
            // Attack must be contiguous; no partial credit across a dip.
            self.attack_time = 0.0;
            self.phase = GatePhase::Idle;
        }
    }

    fn process_open(&mut self, packet: EncodedPacket, out: &mut GateOutput) {
        if !self.cfg.continuous && packet.vad_probability < self.cfg.release_threshold {
            self.release_time += packet.duration;
            self.phase = GatePhase::Releasing;
            if self.release_time + TIME_EPSILON >= self.cfg.release_time_threshold {
                tracing::debug!(
                    "Gate closing after {:.0}ms below release threshold",
                    self.release_time * 1000.0
                );
                self.phase = GatePhase::Idle;
                self.speaking.store(false, Ordering::SeqCst);
                self.attack_time = 0.0;
                self.release_time = 0.0;
                self.fired_sound_start = false;
                out.end_of_utterance = true;
                out.events.push(GateEvent::SpeechEnd);
                out.events.push(GateEvent::SoundEnd);
                // The triggering packet is trailing silence; drop it.
                return;
            }
        } else {
            self.release_time = 0.0;
            self.phase = GatePhase::Speaking;
        }
        out.packets.push(packet);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GateConfig;

    const DUR: f32 = 0.01;

    fn packet(seq: u16, vad: f32) -> EncodedPacket {
        EncodedPacket {
            payload: seq.to_le_bytes().to_vec(),
            vad_probability: vad,
            duration: DUR,
        }
    }

    fn seq_of(p: &EncodedPacket) -> u16 {
        u16::from_le_bytes([p.payload[0], p.payload[1]])
    }

    fn gate() -> VadGate {
        VadGate::new(GateConfig::default())
    }

    #[test]
    fn closed_gate_forwards_nothing() {
        let mut g = gate();
        for i in 0..200 {
            let out = g.process(packet(i, 0.3));
            assert!(out.packets.is_empty());
            assert!(out.events.is_empty());
            assert!(!out.end_of_utterance);
        }
        assert_eq!(g.phase(), GatePhase::Idle);
    }

    #[test]
    fn opens_after_contiguous_attack_and_flushes_preroll_in_order() {
        let mut g = gate();
        // 40 quiet packets to populate the pre-roll
        for i in 0..40 {
            g.process(packet(i, 0.1));
        }
        // Attack: 0.2s / 0.01s = 20 packets; the 20th opens the gate
        let mut opened_at = None;
        let mut flushed = Vec::new();
        for i in 40..70 {
            let out = g.process(packet(i, 0.9));
            if !out.packets.is_empty() && opened_at.is_none() {
                opened_at = Some(i);
                flushed = out.packets;
                assert!(out.events.contains(&GateEvent::SpeechStart));
            }
        }
        assert_eq!(opened_at, Some(59)); // 20th attack packet

        // Flush is bounded by the pre-roll cap and in original order
        let total: f32 = flushed.iter().map(|p| p.duration).sum();
        assert!(total <= PRE_CAP + 1e-6, "flush was {}s", total);
        let seqs: Vec<u16> = flushed.iter().map(seq_of).collect();
        let mut sorted = seqs.clone();
        sorted.sort_unstable();
        assert_eq!(seqs, sorted);
        assert_eq!(*seqs.last().unwrap(), 59);
        assert_eq!(g.phase(), GatePhase::Speaking);
    }

    const PRE_CAP: f32 = 0.5;

    #[test]
    fn sub_threshold_dip_zeroes_attack_credit() {
        let mut g = gate();
        for i in 0..19 {
            g.process(packet(i, 0.9));
        }
        assert_eq!(g.phase(), GatePhase::Attacking);
        // one dip resets everything
        g.process(packet(19, 0.5));
        assert_eq!(g.phase(), GatePhase::Idle);
        // 19 more loud packets are still not enough
        for i in 20..39 {
            let out = g.process(packet(i, 0.9));
            assert!(out.packets.is_empty());
        }
        assert_eq!(g.phase(), GatePhase::Attacking);
        // the 20th contiguous one opens
        let out = g.process(packet(39, 0.9));
        assert!(!out.packets.is_empty());
    }

    #[test]
    fn sound_start_fires_once_per_episode() {
        let mut g = gate();
        let out = g.process(packet(0, 0.9));
        assert_eq!(out.events, vec![GateEvent::SoundStart]);
        for i in 1..10 {
            let out = g.process(packet(i, 0.9));
            assert!(!out.events.contains(&GateEvent::SoundStart));
        }
        // dip and re-attack within the same episode: no second SoundStart
        g.process(packet(10, 0.1));
        let out = g.process(packet(11, 0.9));
        assert!(out.events.is_empty());
    }

    #[test]
    fn release_fires_exactly_at_accumulated_threshold() {
        let mut g = gate();
        for i in 0..20 {
            g.process(packet(i, 0.9));
        }
        assert_eq!(g.phase(), GatePhase::Speaking);

        // 99 sub-threshold packets: 0.99s accumulated, still open and
        // still forwarding
        for i in 20..119 {
            let out = g.process(packet(i, 0.3));
            assert_eq!(out.packets.len(), 1);
            assert!(!out.end_of_utterance);
        }
        assert_eq!(g.phase(), GatePhase::Releasing);

        // the 100th closes the gate and drops the packet
        let out = g.process(packet(119, 0.3));
        assert!(out.packets.is_empty());
        assert!(out.end_of_utterance);
        assert_eq!(out.events, vec![GateEvent::SpeechEnd, GateEvent::SoundEnd]);
        assert_eq!(g.phase(), GatePhase::Idle);
    }

    #[test]
    fn probability_recovery_zeroes_release_credit() {
        let mut g = gate();
        for i in 0..20 {
            g.process(packet(i, 0.9));
        }
        for i in 20..119 {
            g.process(packet(i, 0.3));
        }
        assert_eq!(g.phase(), GatePhase::Releasing);
        // recovery resets the counter
        g.process(packet(119, 0.9));
        assert_eq!(g.phase(), GatePhase::Speaking);
        // a fresh run of 99 is again not enough
        for i in 120..219 {
            let out = g.process(packet(i, 0.3));
            assert_eq!(out.packets.len(), 1);
        }
        let out = g.process(packet(219, 0.3));
        assert!(out.end_of_utterance);
    }

    #[test]
    fn continuous_mode_never_auto_closes() {
        let mut g = VadGate::new(GateConfig {
            continuous: true,
            ..GateConfig::default()
        });
        for i in 0..20 {
            g.process(packet(i, 0.9));
        }
        assert_eq!(g.phase(), GatePhase::Speaking);
        for i in 20..1020 {
            let out = g.process(packet(i, 0.0));
            assert_eq!(out.packets.len(), 1);
            assert!(!out.end_of_utterance);
            assert!(out.events.is_empty());
        }
        assert_eq!(g.phase(), GatePhase::Speaking);
    }

    #[test]
    fn second_episode_fires_sound_start_again() {
        let mut g = gate();
        // first episode through open and close
        let out = g.process(packet(0, 0.9));
        assert!(out.events.contains(&GateEvent::SoundStart));
        for i in 1..20 {
            g.process(packet(i, 0.9));
        }
        for i in 20..120 {
            g.process(packet(i, 0.3));
        }
        assert_eq!(g.phase(), GatePhase::Idle);

        let out = g.process(packet(200, 0.9));
        assert!(out.events.contains(&GateEvent::SoundStart));
    }

    #[test]
    fn preroll_stays_bounded_and_keeps_newest() {
        let mut g = gate();
        // feed far more quiet audio than the cap
        for i in 0..500u16 {
            g.process(packet(i, 0.1));
        }
        // then open the gate
        let mut flushed = Vec::new();
        for i in 500..520 {
            let out = g.process(packet(i, 0.9));
            if !out.packets.is_empty() {
                flushed = out.packets;
            }
        }
        let total: f32 = flushed.iter().map(|p| p.duration).sum();
        assert!(total <= PRE_CAP + 1e-6);
        // oldest were evicted, newest survive
        assert!(seq_of(&flushed[0]) >= 470);
        assert_eq!(seq_of(flushed.last().unwrap()), 519);
    }

    #[test]
    fn speaking_handle_tracks_gate() {
        let mut g = gate();
        let speaking = g.speaking_handle();
        assert!(!speaking.load(Ordering::SeqCst));
        for i in 0..20 {
            g.process(packet(i, 0.9));
        }
        assert!(speaking.load(Ordering::SeqCst));
        for i in 20..120 {
            g.process(packet(i, 0.3));
        }
        assert!(!speaking.load(Ordering::SeqCst));
    }
}
