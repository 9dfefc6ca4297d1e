use clownfish_sys::{cfish_bootstrap_parcel, cfish_install_callbacks, CallbackSlots};
use once_cell::sync::OnceCell;

use crate::config::Config;
use crate::finalizer::{Finalizer, RELEASE_QUEUE};
use crate::panic::host_do_throw;
use crate::trap::host_trap;

/// Proof that the bridge is wired up: callbacks installed, parcel bootstrapped.
///
/// Every entry point that talks to native code goes through [`bootstrap`]
/// first, so no native call can happen before the callback slots are filled.
#[derive(Debug)]
pub struct Parcel {
    config: Config,
    finalizer: Option<Finalizer>,
}

static PARCEL: OnceCell<Parcel> = OnceCell::new();

impl Parcel {
    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn has_finalizer(&self) -> bool {
        self.finalizer.is_some()
    }

    fn init(config: Config) -> Parcel {
        log::debug!("Bootstrapping clownfish bridge with {:?}", config);
        install_callbacks();
        cfish_bootstrap_parcel();

        let finalizer = config
            .finalizer_interval
            .and_then(|interval| match Finalizer::spawn(&RELEASE_QUEUE, interval) {
                Ok(finalizer) => Some(finalizer),
                Err(err) => {
                    log::error!("Failed to start finalizer thread: {}", err);
                    None
                }
            });

        log::info!("Clownfish bridge initialized.");
        Parcel { config, finalizer }
    }
}

/// Bootstraps with the default [`Config`] unless already done.
pub fn bootstrap() -> &'static Parcel {
    match PARCEL.get() {
        Some(parcel) => parcel,
        None => bootstrap_with(Config::default()),
    }
}

/// Bootstraps with `config`. Only the first call on the process has an
/// effect; later calls get the existing parcel back.
pub fn bootstrap_with(config: Config) -> &'static Parcel {
    let parcel = PARCEL.get_or_init(|| Parcel::init(config.clone()));
    if parcel.config != config {
        log::warn!("Clownfish bridge already bootstrapped; ignoring {:?}", config);
    }
    parcel
}

/// Fills the native throw and trap slots with the host implementations.
/// A second installation means another host owns the slots, which cannot be
/// recovered from.
fn install_callbacks() {
    let slots = CallbackSlots {
        do_throw: host_do_throw,
        trap: host_trap,
    };
    // SAFETY: `slots` is a valid pointer for the duration of the call.
    if !unsafe { cfish_install_callbacks(&slots) } {
        log::error!("Clownfish callback slots were already installed by another host");
        eprintln!("clownfish: callback slots already installed");
        std::process::abort();
    }
    log::debug!("Installed clownfish throw/trap callbacks");
}
