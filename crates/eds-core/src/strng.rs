//! Small helpers around `ArcStr`, a cheaply-cloneable immutable string.
//!
//! The index keys a large number of maps by hostname, namespace and clusterID;
//! those strings are shared across every endpoint and shard that references
//! them, so a `String` clone-per-insert is wasteful. `Strng` makes cloning a
//! refcount bump instead of an allocation.

pub type Strng = arcstr::ArcStr;

pub fn new(s: impl AsRef<str>) -> Strng {
	Strng::from(s.as_ref())
}

macro_rules! format {
    ($($arg:tt)*) => {
        $crate::strng::Strng::from(std::format!($($arg)*))
    };
}

pub(crate) use format;
