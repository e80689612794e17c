use crate::cdp::{CdpPage, SessionSetup};
use crate::provision::BrowserProvisioner;
use crate::scaffold::RenderJob;
use crate::{Error, Geometry, Result, Viewport};
use log::{debug, warn};
use std::sync::mpsc::{self, Sender};
use std::sync::Arc;
use std::thread;
use tokio::sync::oneshot;

enum Command {
    LoadHtml(String, oneshot::Sender<Result<()>>),
    AddScript(String, oneshot::Sender<Result<()>>),
    Render(RenderJob, oneshot::Sender<Result<Geometry>>),
    Resize(Viewport, oneshot::Sender<Result<()>>),
    TransparentBackground(oneshot::Sender<Result<()>>),
    Capture(String, oneshot::Sender<Result<Vec<u8>>>),
    Close(oneshot::Sender<Result<()>>),
}

/// An async handle to one browser session backed by a dedicated worker thread.
///
/// The worker thread owns the synchronous [`CdpPage`] and executes commands
/// sent from async tasks, so request handlers never block the runtime on CDP
/// calls. When the handle is dropped without [`close`](Self::close), the
/// command channel disconnects, the worker leaves its loop after the command in
/// flight, and the page (with its browser process) is dropped there.
pub struct BrowserSession {
    cmd_tx: Sender<Command>,
}

impl BrowserSession {
    /// Launch a browser on a new worker thread.
    pub async fn launch(provisioner: Arc<dyn BrowserProvisioner>, setup: SessionSetup) -> Result<Self> {
        let (cmd_tx, cmd_rx) = mpsc::channel::<Command>();
        let (init_tx, init_rx): (oneshot::Sender<Result<()>>, oneshot::Receiver<Result<()>>) =
            oneshot::channel();

        thread::Builder::new()
            .name("diagramshot-browser".into())
            .spawn(move || {
                // Initialize the page on the worker thread
                let page = match CdpPage::launch(provisioner.as_ref(), &setup) {
                    Ok(p) => p,
                    Err(err) => {
                        let _ = init_tx.send(Err(err));
                        return;
                    }
                };

                if init_tx.send(Ok(())).is_err() {
                    // Caller went away while we were launching
                    let _ = page.close();
                    return;
                }

                // Command loop
                while let Ok(cmd) = cmd_rx.recv() {
                    match cmd {
                        Command::LoadHtml(html, resp) => {
                            let _ = resp.send(page.load_html(&html));
                        }
                        Command::AddScript(url, resp) => {
                            let _ = resp.send(page.add_script(&url));
                        }
                        Command::Render(job, resp) => {
                            let _ = resp.send(page.render(&job));
                        }
                        Command::Resize(viewport, resp) => {
                            let _ = resp.send(page.set_viewport(viewport));
                        }
                        Command::TransparentBackground(resp) => {
                            let _ = resp.send(page.set_transparent_background());
                        }
                        Command::Capture(selector, resp) => {
                            let _ = resp.send(page.capture_element(&selector));
                        }
                        Command::Close(resp) => {
                            let _ = resp.send(page.close());
                            return;
                        }
                    }
                }

                debug!("browser session handle dropped; closing browser");
                if let Err(e) = page.close() {
                    warn!("Failed to close abandoned browser: {}", e);
                }
            })
            .map_err(|e| Error::Launch(format!("Failed to spawn browser worker: {}", e)))?;

        // Wait for the worker to report initialization success or failure
        let init_res = init_rx
            .await
            .map_err(|e| Error::Other(format!("Worker init canceled: {}", e)))?;
        init_res?;

        Ok(Self { cmd_tx })
    }

    /// Replace the page content with `html`.
    pub async fn load_html(&self, html: &str) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::LoadHtml(html.to_string(), tx))?;
        rx.await
            .map_err(|e| Error::Other(format!("LoadHtml canceled: {}", e)))?
    }

    /// Inject a script by URL and wait for it to load.
    pub async fn add_script(&self, url: &str) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::AddScript(url.to_string(), tx))?;
        rx.await
            .map_err(|e| Error::Other(format!("AddScript canceled: {}", e)))?
    }

    /// Render `job` in the page and return the measured diagram size.
    pub async fn render(&self, job: RenderJob) -> Result<Geometry> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::Render(job, tx))?;
        rx.await
            .map_err(|e| Error::Other(format!("Render canceled: {}", e)))?
    }

    /// Resize the page's layout viewport.
    pub async fn resize(&self, viewport: Viewport) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::Resize(viewport, tx))?;
        rx.await
            .map_err(|e| Error::Other(format!("Resize canceled: {}", e)))?
    }

    /// Drop the default white page background for subsequent captures.
    pub async fn transparent_background(&self) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::TransparentBackground(tx))?;
        rx.await
            .map_err(|e| Error::Other(format!("TransparentBackground canceled: {}", e)))?
    }

    /// Screenshot the element matched by `selector` as PNG.
    pub async fn capture(&self, selector: &str) -> Result<Vec<u8>> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::Capture(selector.to_string(), tx))?;
        rx.await
            .map_err(|e| Error::Other(format!("Capture canceled: {}", e)))?
    }

    /// Shutdown the background worker and close the browser.
    pub async fn close(self) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::Close(tx))?;
        rx.await
            .map_err(|e| Error::Other(format!("Close canceled: {}", e)))?
    }

    fn send(&self, cmd: Command) -> Result<()> {
        self.cmd_tx
            .send(cmd)
            .map_err(|_| Error::Other("Browser worker has exited".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provision::ServerlessChromium;
    use std::path::PathBuf;
    use std::time::Duration;

    #[tokio::test]
    async fn launch_failure_is_reported_to_caller() {
        let provisioner: Arc<dyn BrowserProvisioner> = Arc::new(ServerlessChromium {
            candidates: vec![PathBuf::from("/definitely/not/here/chromium")],
        });
        let setup = SessionSetup {
            window: Viewport::default(),
            scale: 2.0,
            page_timeout: Duration::from_secs(30),
        };
        match BrowserSession::launch(provisioner, setup).await {
            Err(Error::Launch(msg)) => assert!(msg.contains("No Chromium binary found")),
            Err(other) => panic!("unexpected error: {}", other),
            Ok(_) => panic!("launch should fail without a binary"),
        }
    }
}
