pub use std::collections::{HashMap, HashSet};
pub use std::sync::{Arc, Mutex, RwLock};

pub use anyhow::Context as _;
pub use tracing::{debug, error, info, trace, warn};

pub use crate::strng;
pub use crate::strng::Strng;
