#![allow(dead_code, unused_imports)]

pub use devtask_test_utils::{builders, fakes, init_tracing, with_timeout};
