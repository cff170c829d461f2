use beans_lib::{Bean, ChangeEvent, IncomingLink, LinkReport};
use serde::Serialize;

/// Bean with its current fingerprint (list/create/update).
#[derive(Debug, Clone, Serialize)]
pub struct BeanWithEtag {
    #[serde(flatten)]
    pub bean: Bean,
    pub etag: String,
}

impl BeanWithEtag {
    pub fn new(bean: Bean) -> beans_lib::Result<Self> {
        let etag = bean.etag()?;
        Ok(Self { bean, etag })
    }
}

/// Bean details with incoming edges (show).
#[derive(Debug, Clone, Serialize)]
pub struct BeanDetails {
    #[serde(flatten)]
    pub bean: Bean,
    pub etag: String,
    pub incoming: Vec<IncomingLink>,
}

/// Link scan, optionally after a repair pass (check).
#[derive(Debug, Clone, Serialize)]
pub struct CheckOutput {
    #[serde(flatten)]
    pub report: LinkReport,
    pub fixed: usize,
    pub clean: bool,
}

/// Removal result (delete).
#[derive(Debug, Clone, Serialize)]
pub struct DeleteOutput {
    pub id: String,
    pub links_removed: usize,
}

/// One streamed watcher event (watch).
#[derive(Debug, Clone, Serialize)]
pub struct WatchLine<'a> {
    pub batch: u64,
    #[serde(flatten)]
    pub event: &'a ChangeEvent,
}
