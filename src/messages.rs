/// Messages exchanged between the popup and the background worker
use crate::contact::{ContactRecord, PageType};
use crate::storage::PurgeReport;
use crate::walker::WalkerStatus;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum Request {
    /// Page type and login state of the active tab
    PageInfo,
    /// Extract the profile shown in the active tab and store it
    ScrapeProfile,
    /// Read the search results of the active tab without starting
    PreviewQueue,
    #[serde(rename_all = "camelCase")]
    StartBulk { delay_secs: Option<u32> },
    PauseBulk,
    ResumeBulk,
    BulkStatus,
    #[serde(rename_all = "camelCase")]
    CleanupOldData { days_to_keep: Option<u32> },
    OpenSiteTab,
    #[serde(rename_all = "camelCase")]
    ShowNotification { title: String, message: String },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Response {
    #[serde(rename_all = "camelCase")]
    PageInfo {
        page_type: PageType,
        on_site: bool,
        is_logged_in: bool,
    },
    Profile { contact: ContactRecord },
    Queue { entries: Vec<ContactRecord> },
    Bulk { status: WalkerStatus },
    Cleanup { report: PurgeReport },
    Ack,
    Error { message: String },
}

impl Response {
    pub fn error(message: impl Into<String>) -> Self {
        Response::Error {
            message: message.into(),
        }
    }
}
