//! Mapper lifecycle
//!
//! Startup order is config → devices → output → rapid-fire thread. Shutdown
//! runs the reverse: stop the thread, close the output, release the devices.
//! Shutdown is idempotent and also runs on drop, so a partially started
//! mapper still releases whatever it acquired.

use crate::config::MappingConfig;
use crate::device::EventSource;
use crate::discovery;
use crate::error::MapperError;
use crate::hid_gadget::HidGadget;
use crate::output::{OutputSink, UinputOutput, VirtualOutput};
use crate::rapid_fire::{RapidFireEngine, RapidFireSettings, RapidFireState, JOIN_TIMEOUT};
use crate::router::EventRouter;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

pub struct Mapper {
    running: Arc<AtomicBool>,
    sink: Arc<OutputSink>,
    rapid_fire: Arc<RapidFireState>,
    engine: Option<RapidFireEngine>,
    router: EventRouter,
    shut_down: bool,
}

impl Mapper {
    /// Open devices and output for a loaded config
    pub fn start(
        config: MappingConfig,
        force_auto: bool,
        running: Arc<AtomicBool>,
    ) -> Result<Self, MapperError> {
        let devices = discovery::open_devices(&config.devices, force_auto)?;
        let sources: Vec<Box<dyn EventSource>> = devices
            .into_iter()
            .map(|device| Box::new(device) as Box<dyn EventSource>)
            .collect();

        let mut backends: Vec<Box<dyn VirtualOutput>> =
            vec![Box::new(UinputOutput::new(&config.output.name)?)];
        if let Some(path) = &config.output.hid_gadget {
            match HidGadget::open(path) {
                Ok(gadget) => backends.push(Box::new(gadget)),
                Err(e) => warn!(
                    "Cannot open HID gadget {}: {e}; continuing with uinput only",
                    path.display()
                ),
            }
        }

        Self::from_parts(config, sources, backends, running)
    }

    /// Assemble a mapper from already opened sources and backends
    pub fn from_parts(
        config: MappingConfig,
        sources: Vec<Box<dyn EventSource>>,
        backends: Vec<Box<dyn VirtualOutput>>,
        running: Arc<AtomicBool>,
    ) -> Result<Self, MapperError> {
        let config = Arc::new(config);
        let sink = Arc::new(OutputSink::new(backends));
        let rapid_fire = Arc::new(RapidFireState::new(config.rapid_fire.enabled_by_default));

        let router = EventRouter::new(
            Arc::clone(&config),
            sources,
            Arc::clone(&sink),
            Arc::clone(&rapid_fire),
            Arc::clone(&running),
        );
        let mut mapper = Self {
            running,
            sink,
            rapid_fire,
            engine: None,
            router,
            shut_down: false,
        };

        let engine = RapidFireEngine::spawn(
            Arc::clone(&mapper.sink),
            Arc::clone(&mapper.rapid_fire),
            Arc::clone(&mapper.running),
            RapidFireSettings {
                button: config.rapid_fire.button,
                rate_hz: config.rapid_fire.rate_hz,
            },
        )
        .map_err(MapperError::Thread)?;
        mapper.engine = Some(engine);

        info!("Mapper started");
        Ok(mapper)
    }

    /// Route events until interrupted or the controller is lost
    pub fn run(&mut self) -> Result<(), MapperError> {
        self.router.run()
    }

    /// Stop everything. Only the first call has any effect.
    pub fn shutdown(&mut self) {
        if self.shut_down {
            return;
        }
        self.shut_down = true;
        info!("Shutting down");

        self.running.store(false, Ordering::SeqCst);
        if let Some(mut engine) = self.engine.take() {
            engine.stop(JOIN_TIMEOUT);
        }
        if self.sink.close() {
            debug!("Output closed");
        }
        let released = self.router.release_sources();
        debug!("Released {released} input device(s)");
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down
    }

    pub fn sink(&self) -> &Arc<OutputSink> {
        &self.sink
    }

    pub fn rapid_fire(&self) -> &Arc<RapidFireState> {
        &self.rapid_fire
    }

    pub fn router(&self) -> &EventRouter {
        &self.router
    }
}

impl Drop for Mapper {
    fn drop(&mut self) {
        self.shutdown();
    }
}
