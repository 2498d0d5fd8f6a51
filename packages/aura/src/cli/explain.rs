use anyhow::{Context, Result, anyhow};
use std::io::Read;
use tracing::{debug, info};

use aura_stream::{RepoLocation, SelectRequest, SessionController};

use crate::config::FileConfig;
use crate::render::TerminalConsumer;

/// Stream an explanation of `text` (or stdin) inside the file at `url`.
pub async fn explain_command(
    settings: &FileConfig,
    url: &str,
    text: Option<String>,
    language: Option<String>,
) -> Result<()> {
    let location = RepoLocation::parse(url)?;
    let selection = match text {
        Some(text) => text,
        None => read_stdin()?,
    };
    let request = SelectRequest::new(location, &selection, language.as_deref())?;

    let stream_config = settings.stream_config();
    info!(
        server = %stream_config.base_url,
        file = %request.file,
        language = %request.language,
        "requesting explanation"
    );

    let controller = SessionController::from_config(&stream_config);
    let (consumer, finished) = TerminalConsumer::new(std::io::stdout());
    let session = controller.start(request, consumer);

    tokio::select! {
        result = finished => match result {
            Ok(Ok(())) => Ok(()),
            Ok(Err(message)) => Err(anyhow!(message)),
            // Consumer dropped without a terminal event
            Err(_) => Ok(()),
        },
        signal = tokio::signal::ctrl_c() => {
            signal.context("Failed to listen for Ctrl-C")?;
            controller.cancel_current();
            session.finished().await;
            debug!("cancelled by user");
            Ok(())
        }
    }
}

fn read_stdin() -> Result<String> {
    let mut buf = String::new();
    std::io::stdin()
        .read_to_string(&mut buf)
        .context("Failed to read selection from stdin")?;
    Ok(buf)
}
