pub mod messages;
pub mod transport;
pub mod ws;

pub use messages::{parse_result_batch, RecognitionAlternative, RecognitionResult};
pub use transport::{Transport, TransportConnector, TransportEvent};
pub use ws::WsConnector;
