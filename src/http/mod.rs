pub mod caselessheaders;
pub mod querystring;
pub mod requestbody;
pub mod response;
pub mod responsebody;
pub mod streamfactory;
pub mod transaction;

// Re-exports for convenience
pub use caselessheaders::CaselessHeaderMap;
pub use requestbody::RequestBody;
pub use response::ResponseEnvelope;
pub use responsebody::{ResponseAssembler, ResponseBody, StreamEvent};
pub use streamfactory::{OutgoingStream, ResponseHead, ResponseStart, SocketTransport};
