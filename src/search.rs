pub mod executor;
pub mod matcher;
pub mod native;
pub mod process;

pub use executor::{Collected, MatchStream, SearchExecutor};
pub use matcher::{CancellationToken, LineMatcher, MatchSink, RawMatch, ScanStats};
pub use native::NativeMatcher;
pub use process::GrepProcessMatcher;
