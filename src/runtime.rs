//! The builder actor.
//!
//! [`BuilderRuntime`] owns a [`MockupBuilder`] and is the only code that
//! touches it while running. The host sends [`HostEvent`]s in and receives
//! [`UiEvent`]s out. Loads and submissions run as spawned tasks whose
//! results come back into the actor loop, so scene mutation is never
//! interleaved.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::{JoinHandle, JoinSet};

use crate::builder::{BackgroundOutcome, MockupBuilder};
use crate::cart::{is_cart_add_action, CartBackend, CartForm, CartItem};
use crate::config::Config;
use crate::error::{MockupError, Result};
use crate::events::{HostEvent, Notification, UiEvent};
use crate::image_loader::{load_from_file, ImageLoader};
use crate::types::{Bitmap, PageContext};
use crate::upload::{format_file_size, UploadedFile};

pub const CART_SUCCESS_MESSAGE: &str = "Product added to cart successfully!";
pub const CART_FAILURE_MESSAGE: &str = "Failed to add product to cart. Please try again.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeOptions {
    pub debounce: Duration,
    pub cart_drawer: bool,
    pub cart_action_suffix: String,
}

impl RuntimeOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            debounce: config.variants.debounce,
            cart_drawer: config.cart.drawer,
            cart_action_suffix: config.cart.action_suffix.clone(),
        }
    }
}

impl Default for RuntimeOptions {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

type LoadDone = (u64, Result<Bitmap>);

pub struct BuilderRuntime {
    builder: MockupBuilder,
    loader: ImageLoader,
    cart: Arc<dyn CartBackend>,
    options: RuntimeOptions,
    ui: mpsc::Sender<UiEvent>,
    submitting: bool,
}

impl BuilderRuntime {
    pub fn new(
        builder: MockupBuilder,
        loader: ImageLoader,
        cart: Arc<dyn CartBackend>,
        options: RuntimeOptions,
        ui: mpsc::Sender<UiEvent>,
    ) -> Self {
        Self {
            builder,
            loader,
            cart,
            options,
            ui,
            submitting: false,
        }
    }

    /// Run on a new task; the handle yields the builder once `host` closes
    /// and all outstanding work has drained.
    pub fn spawn(self, host: mpsc::Receiver<HostEvent>) -> JoinHandle<MockupBuilder> {
        tokio::spawn(self.run(host))
    }

    pub async fn run(mut self, mut host: mpsc::Receiver<HostEvent>) -> MockupBuilder {
        let (signal_tx, signal_rx) = mpsc::channel::<PageContext>(64);
        let mut signals = crate::debounce::debounce(self.options.debounce, signal_rx);
        let mut signal_tx = Some(signal_tx);
        let mut loads: JoinSet<LoadDone> = JoinSet::new();
        let mut submissions: JoinSet<Result<CartItem>> = JoinSet::new();
        let mut host_open = true;

        loop {
            tokio::select! {
                event = host.recv(), if host_open => match event {
                    Some(event) => self.handle_host_event(event, signal_tx.as_ref(), &mut submissions).await,
                    None => {
                        tracing::debug!("host closed, draining");
                        host_open = false;
                        signal_tx = None;
                    }
                },
                Some(page) = signals.recv() => self.refresh_background(&page, &mut loads),
                Some(done) = loads.join_next(), if !loads.is_empty() => match done {
                    Ok((token, result)) => self.finish_load(token, result).await,
                    Err(err) => tracing::error!(error = %err, "background load task failed"),
                },
                Some(done) = submissions.join_next(), if !submissions.is_empty() => {
                    let result = done.unwrap_or_else(|err| {
                        Err(MockupError::Unknown(format!("submission task failed: {err}")))
                    });
                    self.finish_submission(result).await;
                },
                else => break,
            }
        }

        self.builder
    }

    async fn handle_host_event(
        &mut self,
        event: HostEvent,
        signals: Option<&mpsc::Sender<PageContext>>,
        submissions: &mut JoinSet<Result<CartItem>>,
    ) {
        match event {
            HostEvent::VariantChanged { kind, page } => {
                tracing::debug!(?kind, "variant signal");
                if let Some(signals) = signals {
                    if signals.send(page).await.is_err() {
                        tracing::warn!("variant debouncer stopped");
                    }
                }
            }
            HostEvent::FileSelected(file) => self.select_file(file).await,
            HostEvent::RemoveDesign => {
                if self.builder.remove_design() {
                    self.emit(UiEvent::DesignControls { visible: false }).await;
                }
            }
            HostEvent::CenterDesign => {
                self.builder.center_design();
            }
            HostEvent::ClearSelection => {
                self.builder.clear_selection();
            }
            HostEvent::Gesture(gesture) => {
                if let Err(err) = self.builder.apply_gesture(gesture) {
                    tracing::debug!(?gesture, error = %err, "gesture rejected");
                }
            }
            HostEvent::Resize(size) => {
                if self.builder.resize_canvas(size) {
                    tracing::debug!(%size, "canvas resized");
                }
            }
            HostEvent::SubmitRequested(form) => self.submit(form, submissions).await,
        }
    }

    fn refresh_background(&mut self, page: &PageContext, loads: &mut JoinSet<LoadDone>) {
        let Some(request) = self.builder.begin_background_refresh(page) else {
            return;
        };
        let loader = self.loader.clone();
        loads.spawn(async move {
            let result = loader.load(&request.url).await;
            (request.token, result)
        });
    }

    async fn finish_load(&mut self, token: u64, result: Result<Bitmap>) {
        match self.builder.apply_background(token, result) {
            BackgroundOutcome::Applied { url } => {
                self.emit(UiEvent::BackgroundChanged { url }).await;
            }
            BackgroundOutcome::Stale => {}
            BackgroundOutcome::Failed(err) => {
                self.emit(UiEvent::Notify(Notification::error(err.user_message())))
                    .await;
            }
        }
    }

    async fn select_file(&mut self, file: UploadedFile) {
        let constraint = self.builder.upload_constraint().clone();
        let decoded = tokio::task::spawn_blocking(move || {
            let result = load_from_file(&file, &constraint);
            (file, result)
        })
        .await;

        match decoded {
            Ok((file, Ok(bitmap))) => {
                let label = format!("✓ {} ({})", file.name, format_file_size(file.size()));
                self.builder.place_design(file, bitmap);
                self.emit(UiEvent::Notify(Notification::info(label))).await;
                self.emit(UiEvent::DesignControls { visible: true }).await;
            }
            Ok((file, Err(err))) => {
                tracing::warn!(file = %file.name, error = %err, "upload failed");
                self.emit(UiEvent::Notify(Notification::error(err.user_message())))
                    .await;
            }
            Err(err) => {
                tracing::error!(error = %err, "upload decode task failed");
                self.emit(UiEvent::Notify(Notification::error(
                    "The image could not be read. Please try a different file.",
                )))
                .await;
            }
        }
    }

    async fn submit(&mut self, form: CartForm, submissions: &mut JoinSet<Result<CartItem>>) {
        if !is_cart_add_action(&form.action, &self.options.cart_action_suffix) {
            tracing::debug!(action = %form.action, "not a cart form, ignoring");
            return;
        }
        if self.submitting {
            tracing::debug!("submit ignored, already processing");
            return;
        }
        self.submitting = true;
        self.emit(UiEvent::SubmitBusy { busy: true }).await;

        let submission = self.builder.prepare_submission(form);
        let cart = Arc::clone(&self.cart);
        submissions.spawn(async move { cart.add(submission).await });
    }

    async fn finish_submission(&mut self, result: Result<CartItem>) {
        self.submitting = false;
        self.emit(UiEvent::SubmitBusy { busy: false }).await;
        match result {
            Ok(item) => {
                self.emit(UiEvent::Notify(Notification::success(CART_SUCCESS_MESSAGE)))
                    .await;
                if self.options.cart_drawer {
                    self.emit(UiEvent::CartUpdated { key: item.key }).await;
                } else {
                    self.emit(UiEvent::ReloadRequested).await;
                }
            }
            Err(err) => {
                tracing::error!(error = %err, "add to cart failed");
                self.emit(UiEvent::Notify(Notification::error(CART_FAILURE_MESSAGE)))
                    .await;
                self.emit(UiEvent::ReloadRequested).await;
            }
        }
    }

    async fn emit(&self, event: UiEvent) {
        if self.ui.send(event).await.is_err() {
            tracing::trace!("ui receiver dropped");
        }
    }
}
