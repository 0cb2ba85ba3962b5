//! Report delivery.
//!
//! A sink takes a finished [`AlertReport`] and pushes it somewhere outside the
//! process. Sinks never influence evaluation; a failed delivery is logged and
//! counted by the caller.

mod stream;
mod telegram;

pub use stream::{RedisStreamSink, REPORT_STREAM};
pub use telegram::{render_report, TelegramSink};

use async_trait::async_trait;

use crate::error::NotifyError;
use crate::report::AlertReport;

#[async_trait]
pub trait ReportSink: Send + Sync {
    fn name(&self) -> &'static str;

    async fn deliver(&self, report: &AlertReport) -> Result<(), NotifyError>;
}
