//! API endpoint handlers.
//!
//! Validation happens on the async task; the engine itself runs on the
//! blocking pool. Every failure, including a panic inside the engine,
//! ends up as an `{error}` envelope.

use tokio::task;
use tracing::debug;

use crate::adapter;
use crate::envelope::Envelope;
use crate::error::EngineTaskError;
use crate::fileset::decompose;
use crate::request::{parse_disasm, parse_render};

/// Run engine work on the blocking pool and fold its result into an
/// envelope.
async fn run_engine<F>(work: F) -> Envelope
where
    F: FnOnce() -> Result<String, ktemplate::Error> + Send + 'static,
{
    match task::spawn_blocking(work).await {
        Ok(Ok(text)) => Envelope::result(text),
        Ok(Err(e)) => {
            debug!(error = %e, "engine error");
            Envelope::error(e.full_message())
        }
        Err(e) => EngineTaskError::from(e).into(),
    }
}

/// `POST /api/render`: render the submitted template set.
pub async fn render(body: &[u8]) -> Envelope {
    let request = match parse_render(body) {
        Ok(request) => request,
        Err(e) => return e.into(),
    };
    run_engine(move || {
        let files = decompose(&request.source);
        adapter::render(&files, request.data)
    })
    .await
}

/// `POST /api/disasm`: disassemble the entry-point template.
pub async fn disasm(body: &[u8]) -> Envelope {
    let request = match parse_disasm(body) {
        Ok(request) => request,
        Err(e) => return e.into(),
    };
    run_engine(move || adapter::disassemble(&decompose(&request.source))).await
}

/// `GET /api/info`: report the engine version.
pub fn info() -> Envelope {
    Envelope::Info {
        kphp_version: adapter::engine_version(),
    }
}
