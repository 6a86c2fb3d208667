use crate::login::{self, LoginForm, Navigator};
use crate::page::{Page, View};
use crate::qr::ObjectUrlRegistry;
use crate::render::Links;
use crate::storage::Session;
use crate::{ClientConfig, Error, Result};
use std::sync::mpsc::{self, Sender};
use std::thread;
use std::time::Duration;
use tokio::sync::oneshot;

enum Command {
    Load(View, Page, oneshot::Sender<Page>),
    Login(LoginForm, oneshot::Sender<Result<Option<String>>>),
    Refresh(oneshot::Sender<Result<()>>),
    Logout(oneshot::Sender<Result<()>>),
    Close(oneshot::Sender<()>),
}

// Captures the login redirect so it can be handed back to the async caller
#[derive(Default)]
struct CapturedNavigation(std::sync::Mutex<Option<String>>);

impl Navigator for CapturedNavigation {
    fn navigate(&self, target: &str) {
        if let Ok(mut slot) = self.0.lock() {
            *slot = Some(target.to_string());
        }
    }
}

/// An async-friendly gallery client backed by a dedicated worker thread.
///
/// The worker owns the blocking HTTP client and executes commands sent from
/// async tasks, one at a time, so pages are still loaded strictly one after
/// another.
#[derive(Clone)]
pub struct AsyncGallery {
    cmd_tx: Sender<Command>,
}

impl AsyncGallery {
    /// Create a new client (spawns the worker thread that owns it).
    pub async fn new(config: ClientConfig, session: Session, links: Links) -> Result<Self> {
        let (cmd_tx, cmd_rx) = mpsc::channel::<Command>();
        let (init_tx, init_rx) = oneshot::channel::<Result<()>>();

        thread::spawn(move || {
            // The blocking client must be created and dropped off the async runtime
            let api = match crate::new_api(config, session.clone()) {
                Ok(api) => api,
                Err(err) => {
                    let _ = init_tx.send(Err(err));
                    return;
                }
            };
            let images = ObjectUrlRegistry::new();
            let _ = init_tx.send(Ok(()));

            while let Ok(cmd) = cmd_rx.recv() {
                match cmd {
                    Command::Load(view, mut page, resp) => {
                        view.load(&mut page, &api, &links, &images);
                        let _ = resp.send(page);
                    }
                    Command::Login(form, resp) => {
                        let nav = CapturedNavigation::default();
                        let res = form
                            .submit(&api, &session, &nav)
                            .map(|_| nav.0.lock().ok().and_then(|mut t| t.take()));
                        let _ = resp.send(res);
                    }
                    Command::Refresh(resp) => {
                        let _ = resp.send(login::refresh(&api, &session));
                    }
                    Command::Logout(resp) => {
                        let _ = resp.send(login::logout(&api, &session));
                    }
                    Command::Close(resp) => {
                        let _ = resp.send(());
                        break;
                    }
                }
            }
        });

        init_rx
            .await
            .map_err(|_| Error::Other("gallery worker exited during startup".into()))??;
        Ok(Self { cmd_tx })
    }

    fn send(&self, cmd: Command) -> Result<()> {
        self.cmd_tx
            .send(cmd)
            .map_err(|_| Error::Other("gallery worker stopped".into()))
    }

    /// Load `view` into `page` and hand the page back.
    ///
    /// Keep `page.cancel_handle()` before calling to cancel from another task.
    pub async fn load(&self, view: View, page: Page) -> Result<Page> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::Load(view, page, tx))?;
        rx.await
            .map_err(|_| Error::Other("gallery worker dropped the page".into()))
    }

    /// Like [`load`](Self::load) but gives up after `timeout`; the page's
    /// fetch is cancelled so nothing renders late.
    pub async fn load_with_timeout(&self, view: View, page: Page, timeout: Duration) -> Result<Page> {
        let cancel = page.cancel_handle();
        match tokio::time::timeout(timeout, self.load(view, page)).await {
            Ok(res) => res,
            Err(_) => {
                cancel.cancel();
                Err(Error::Timeout(timeout.as_millis() as u64))
            }
        }
    }

    /// Submit the login form; returns the page to navigate to
    pub async fn login(&self, form: LoginForm) -> Result<Option<String>> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::Login(form, tx))?;
        rx.await
            .map_err(|_| Error::Other("gallery worker stopped".into()))?
    }

    pub async fn refresh(&self) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::Refresh(tx))?;
        rx.await
            .map_err(|_| Error::Other("gallery worker stopped".into()))?
    }

    pub async fn logout(&self) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::Logout(tx))?;
        rx.await
            .map_err(|_| Error::Other("gallery worker stopped".into()))?
    }

    /// Stop the worker thread
    pub async fn close(self) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::Close(tx))?;
        rx.await
            .map_err(|_| Error::Other("gallery worker stopped".into()))
    }
}
