#![allow(dead_code)]
#![allow(unused_imports)]

mod body;
pub use body::*;

mod engines;
pub use engines::*;

pub fn tracing_init() {
    // From env var: `RUST_LOG`
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}
