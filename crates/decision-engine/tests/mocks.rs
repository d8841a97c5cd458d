//! Mock implementations of the ports `decide` depends on, for tests that
//! need to assert on call shape rather than inspect captured state.

use access_log::{AccessLogSink, AccessRecord};
use mockall::mock;

mock! {
    pub Sink {}

    impl AccessLogSink for Sink {
        fn submit(&self, record: AccessRecord);
    }
}
