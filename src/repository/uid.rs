use std::{fmt::Display, num::NonZeroU64, ops::Add};

/// Store assigned identifier of a message inside a folder.
///
/// A message that has not been stored yet carries no `Uid` at all, so the
/// "not yet assigned" state is `Option<Uid>::None` rather than a zero value.
#[derive(Debug, PartialEq, Clone, Copy, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct Uid(NonZeroU64);

impl Uid {
    pub const MIN: Self = Self(NonZeroU64::MIN);
    pub const MAX: Self = Self(NonZeroU64::MAX);

    pub fn get(self) -> u64 {
        self.0.get()
    }
}

impl Add<u64> for Uid {
    type Output = Uid;

    fn add(self, rhs: u64) -> Self::Output {
        Uid(self.0.saturating_add(rhs))
    }
}

impl Display for Uid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl TryFrom<u64> for Uid {
    type Error = &'static str;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        Ok(Self(
            NonZeroU64::new(value).ok_or("Cannot convert u64 to nonzero")?,
        ))
    }
}

impl TryFrom<&u64> for Uid {
    type Error = <Self as TryFrom<u64>>::Error;

    fn try_from(value: &u64) -> Result<Self, Self::Error> {
        Self::try_from(*value)
    }
}

impl From<Uid> for u64 {
    fn from(value: Uid) -> Self {
        value.0.into()
    }
}

impl From<NonZeroU64> for Uid {
    fn from(value: NonZeroU64) -> Self {
        Self(value)
    }
}

impl From<Uid> for NonZeroU64 {
    fn from(value: Uid) -> Self {
        value.0
    }
}

impl From<&Uid> for u64 {
    fn from(value: &Uid) -> Self {
        value.0.into()
    }
}
