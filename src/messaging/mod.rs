pub mod codec_error;
pub mod payload;
pub mod schema;
pub mod message;
pub mod messages;
pub mod packet;
pub mod packet_decoder;
pub mod sender;
