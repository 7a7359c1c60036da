mod bitmessage;
mod email;

pub use bitmessage::Bitmessage;
pub use bitmessage::CodecError;
pub use bitmessage::Encoding;
pub use bitmessage::ImapData;
pub use bitmessage::MessageState;
pub use bitmessage::Payload;
pub use email::Email;
pub use email::EmailBuilder;
pub use email::EmailBuilderError;
