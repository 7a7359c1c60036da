mod flag;
mod message_sequence;
mod sequence_set;
mod uid;

pub use flag::Flag;
pub use flag::UnknownFlagError;
pub use message_sequence::MessageSequence;
pub use sequence_set::EmptySetError;
pub use sequence_set::ParseSetError;
pub use sequence_set::SequenceRange;
pub use sequence_set::SequenceSet;
pub use sequence_set::SequenceSetBuilder;
pub use sequence_set::SetValue;
pub use uid::Uid;
