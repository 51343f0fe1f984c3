use crate::camera::Camera;
use crate::config::{Config, Mode};
use crate::image_source::CameraSource;
use crate::server::HttpServer;
use crate::translator::Translator;

use std::{
    error::Error,
    io::{self, BufRead},
    sync::Arc,
    time::Duration,
};
use tokio::{
    signal,
    sync::{broadcast, mpsc},
};

pub async fn start_app(config: Config) -> Result<(), Box<dyn Error>> {
    std::fs::create_dir_all(&config.debug.image_dir)?;
    tracing::info!(
        "Debug images directory: {}",
        config.debug.image_dir.display()
    );

    let translator = match Translator::from_config(&config) {
        Ok(translator) => Arc::new(translator),
        Err(e) => {
            tracing::error!("Failed to initialize translation client: {:?}", e);
            return Err(Box::new(e));
        }
    };

    tracing::info!(
        api_key_configured = translator.has_credential(),
        "Translator ready"
    );

    match config.mode {
        Mode::Server => run_server(translator, &config).await,
        Mode::Capture => run_capture_loop(translator, &config).await,
    }
}

async fn run_server(translator: Arc<Translator>, config: &Config) -> Result<(), Box<dyn Error>> {
    let server = HttpServer::new(
        translator,
        &config.server.get_address(),
        config.server.max_body_bytes,
    )
    .await?;

    let (shutdown_tx, _) = broadcast::channel(1);
    let server_handle = server.run(shutdown_tx.subscribe()).await?;

    shutdown_signal().await;
    tracing::info!("Shutdown signal received, starting graceful shutdown.");

    let _ = shutdown_tx.send(());
    if let Ok(Err(e)) = server_handle.await {
        tracing::error!("Server exited with error: {:?}", e);
    }

    Ok(())
}

async fn run_capture_loop(
    translator: Arc<Translator>,
    config: &Config,
) -> Result<(), Box<dyn Error>> {
    println!("Sign Language Translation");
    println!("=========================");

    let camera = match Camera::open(&config.camera) {
        Ok(camera) => Arc::new(camera),
        Err(e) => {
            tracing::error!("Failed to initialize camera: {:?}", e);
            println!("Failed to initialize camera: {}", e);
            return Err(Box::new(e));
        }
    };

    let mut source = CameraSource::new(
        camera,
        Duration::from_secs(config.camera.countdown_secs),
        translator.codec(),
    );
    if config.camera.save_captures {
        source = source.with_capture_dir(config.debug.image_dir.clone());
    }

    let mut lines = spawn_line_reader(io::BufReader::new(io::stdin()));

    loop {
        println!("\nCapture a sign language gesture");
        let outcome = tokio::select! {
            outcome = translator.translate(&source) => outcome,
            _ = shutdown_signal() => {
                println!("\nOperation cancelled by user.");
                break;
            }
        };

        match outcome {
            Ok(result) => {
                println!("\n=== TRANSLATION RESULT ===");
                println!("Sign Language Detected: {}", result.text);
                println!("Confidence: {:.2}", result.confidence);
                println!("==========================");
            }
            Err(e) => {
                tracing::error!("Capture failed: {}", e);
                println!("Failed to capture image.");
            }
        }

        println!("\nTranslate another gesture? (y/n): ");
        let answer = tokio::select! {
            line = lines.recv() => line,
            _ = shutdown_signal() => None,
        };
        match answer {
            Some(answer) if answer.trim().eq_ignore_ascii_case("y") => continue,
            _ => break,
        }
    }

    // The camera handle is released when `source` drops here.
    println!("\nSign language translation complete.");
    Ok(())
}

/// Forwards lines from a blocking reader through a channel. The reading
/// thread is detached so a pending read never holds up runtime shutdown.
fn spawn_line_reader<R>(reader: R) -> mpsc::UnboundedReceiver<String>
where
    R: BufRead + Send + 'static,
{
    let (tx, rx) = mpsc::unbounded_channel();
    std::thread::spawn(move || {
        for line in reader.lines() {
            match line {
                Ok(line) => {
                    if tx.send(line).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    tracing::warn!("Failed to read from stdin: {:?}", e);
                    break;
                }
            }
        }
    });
    rx
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {:?}", e);
            std::future::pending::<()>().await;
        }
    };

    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install signal handler: {:?}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Read};
    use std::time::Instant;

    /// Blocks every read until its sender is dropped.
    struct StalledReader(std::sync::mpsc::Receiver<()>);

    impl Read for StalledReader {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            let _ = self.0.recv();
            Ok(0)
        }
    }

    #[tokio::test]
    async fn test_line_reader_forwards_lines_then_closes() {
        let mut lines = spawn_line_reader(Cursor::new("y\nn\n"));

        assert_eq!(lines.recv().await.as_deref(), Some("y"));
        assert_eq!(lines.recv().await.as_deref(), Some("n"));
        assert_eq!(lines.recv().await, None);
    }

    #[test]
    fn test_pending_read_does_not_block_runtime_shutdown() {
        let (_unblock, stalled) = std::sync::mpsc::channel::<()>();
        let runtime = tokio::runtime::Runtime::new().unwrap();

        let answer = runtime.block_on(async {
            let mut lines = spawn_line_reader(io::BufReader::new(StalledReader(stalled)));
            tokio::select! {
                line = lines.recv() => line,
                _ = tokio::time::sleep(Duration::from_millis(50)) => None,
            }
        });

        let started = Instant::now();
        drop(runtime);

        assert_eq!(answer, None);
        assert!(started.elapsed() < Duration::from_secs(2));
    }
}
