// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

use std::collections::HashMap;

use fmrx_app::backend_key;
use fmrx_core::tuner::{TunerCallback, TunerTransport};
use fmrx_core::DynResult;
use tokio::sync::mpsc;

mod sim;

pub use sim::{SimChip, SimConfig, SimStation, SimTuner};

/// What a transport needs to be instantiated.
#[derive(Debug, Clone)]
pub struct BackendOptions {
    /// Where the transport delivers its asynchronous responses.
    pub callbacks: mpsc::UnboundedSender<TunerCallback>,
    /// Settings of the simulated chip.
    pub sim: SimConfig,
}

pub type BackendFactory = fn(BackendOptions) -> DynResult<Box<dyn TunerTransport>>;

/// Context for registering and instantiating tuner transports.
#[derive(Clone)]
pub struct RegistrationContext {
    factories: HashMap<String, BackendFactory>,
}

impl RegistrationContext {
    /// Create a new empty registration context.
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Register a transport factory under a stable name (e.g. "sim").
    pub fn register_backend(&mut self, name: &str, factory: BackendFactory) {
        let key = backend_key(name);
        self.factories.insert(key, factory);
    }

    /// Check whether a backend name is registered.
    pub fn is_backend_registered(&self, name: &str) -> bool {
        let key = backend_key(name);
        self.factories.contains_key(&key)
    }

    /// List registered backend names.
    pub fn registered_backends(&self) -> Vec<String> {
        let mut names: Vec<String> = self.factories.keys().cloned().collect();
        names.sort();
        names
    }

    /// Instantiate the transport registered under `name`.
    pub fn build_transport(
        &self,
        name: &str,
        options: BackendOptions,
    ) -> DynResult<Box<dyn TunerTransport>> {
        let key = backend_key(name);
        let factory = self
            .factories
            .get(&key)
            .ok_or_else(|| format!("Unknown tuner backend: {}", name))?;
        factory(options)
    }
}

impl Default for RegistrationContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Register all built-in backends on a context.
pub fn register_builtin_backends_on(context: &mut RegistrationContext) {
    context.register_backend("sim", sim_factory);
}

fn sim_factory(options: BackendOptions) -> DynResult<Box<dyn TunerTransport>> {
    Ok(Box::new(SimTuner::new(options.sim, options.callbacks)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options() -> (BackendOptions, mpsc::UnboundedReceiver<TunerCallback>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            BackendOptions {
                callbacks: tx,
                sim: SimConfig::default(),
            },
            rx,
        )
    }

    #[test]
    fn test_builtin_registration() {
        let mut context = RegistrationContext::new();
        register_builtin_backends_on(&mut context);

        assert!(context.is_backend_registered("sim"));
        assert!(context.is_backend_registered("SIM"));
        assert!(context.is_backend_registered(" Sim "));
        assert_eq!(context.registered_backends(), vec!["sim".to_string()]);
    }

    #[test]
    fn test_unknown_backend() {
        let context = RegistrationContext::default();
        let (options, _rx) = options();
        let err = context.build_transport("si4705", options).err().unwrap();
        assert!(err.to_string().contains("si4705"));
    }

    #[test]
    fn test_build_sim_transport() {
        let mut context = RegistrationContext::new();
        register_builtin_backends_on(&mut context);
        let (options, mut rx) = options();

        let mut transport = context.build_transport("sim", options).unwrap();
        assert!(transport.enable());
        assert_eq!(rx.try_recv().unwrap(), TunerCallback::power(true));
    }
}
