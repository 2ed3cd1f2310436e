use parking_lot::RwLock;
use std::sync::Arc;

use crate::engine::CodecError;
use crate::pcm::{Pcm16Engine, ScorerCalibration};

/// Immutable engine blueprint, loaded once per process.
///
/// Loading is the expensive part of bringing a codec up (for a native codec
/// this is where tables are built and the binary interface is verified), so
/// the module is cached process-wide and sessions only instantiate per-session
/// engines from it. Only the session coordinator triggers loading.
pub struct EngineModule {
    version: String,
    calibration: ScorerCalibration,
}

impl EngineModule {
    fn load() -> Result<Self, CodecError> {
        let calibration = ScorerCalibration::default();
        if calibration.spread_db <= 0.0 || !(0.0..1.0).contains(&calibration.floor_alpha) {
            return Err(CodecError::Init(
                "invalid scorer calibration".to_string(),
            ));
        }
        Ok(Self {
            version: "pcm16-energy/1".to_string(),
            calibration,
        })
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    /// Create a fresh engine instance carrying its own cross-frame state.
    pub fn instantiate(&self) -> Pcm16Engine {
        Pcm16Engine::new(self.calibration.clone())
    }
}

static MODULE: RwLock<Option<Arc<EngineModule>>> = RwLock::new(None);

/// Get the process-wide engine module, loading it on first use.
pub fn engine_module() -> Result<Arc<EngineModule>, CodecError> {
    if let Some(module) = MODULE.read().as_ref() {
        return Ok(module.clone());
    }

    let mut slot = MODULE.write();
    if let Some(module) = slot.as_ref() {
        return Ok(module.clone());
    }
    let module = Arc::new(EngineModule::load()?);
    tracing::info!("Codec engine module loaded: {}", module.version());
    *slot = Some(module.clone());
    Ok(module)
}

/// Drop the cached module so the next `engine_module` call reloads it.
/// Test hook only; production code never unloads the module.
pub fn reset_engine_module() {
    *MODULE.write() = None;
}

#[cfg(test)]
mod tests {
    use super::*;

    // One test so the process-wide slot is not raced by the test harness.
    #[test]
    fn module_is_cached_until_reset() {
        reset_engine_module();
        let a = engine_module().unwrap();
        let b = engine_module().unwrap();
        assert!(Arc::ptr_eq(&a, &b));

        reset_engine_module();
        let c = engine_module().unwrap();
        assert!(!Arc::ptr_eq(&a, &c));
    }
}
