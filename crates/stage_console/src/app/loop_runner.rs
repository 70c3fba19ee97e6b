use std::io;
use std::process::ExitCode;

use tokio::io::{stdin, stdout, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::{error, info};

use super::bootstrap::AppWiring;
use super::session::{ConsoleSession, SessionFlow};

pub(crate) fn run(app: AppWiring) -> ExitCode {
    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
    {
        Ok(runtime) => runtime,
        Err(err) => {
            error!(error = %err, "startup_failed");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run_console(ConsoleSession::new(app))) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(error = %err, "console_io_failed");
            ExitCode::FAILURE
        }
    }
}

/// Reads commands line by line until `quit` or end of input. Runs keep
/// advancing while the console waits for the next line.
async fn run_console(mut session: ConsoleSession) -> io::Result<()> {
    let mut lines = BufReader::new(stdin()).lines();
    let mut writer = stdout();
    let mut out = Vec::new();

    info!("console_ready");
    while let Some(line) = lines.next_line().await? {
        let flow = session.handle_line(&line, &mut out).await;
        flush_lines(&mut writer, &mut out).await?;
        if flow == SessionFlow::Quit {
            break;
        }
    }

    session.finish(&mut out).await;
    flush_lines(&mut writer, &mut out).await?;
    info!("console_closed");
    Ok(())
}

async fn flush_lines<W>(writer: &mut W, out: &mut Vec<String>) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    for line in out.drain(..) {
        writer.write_all(line.as_bytes()).await?;
        writer.write_all(b"\n").await?;
    }
    writer.flush().await
}
