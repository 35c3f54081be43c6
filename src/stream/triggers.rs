//! Callback registries for stream automation

use crate::capture::Frame;

type Hook = Box<dyn FnMut() + Send>;
type ImageHook = Box<dyn FnMut(&Frame) + Send>;

/// Callbacks invoked synchronously by the controller, in registration order.
#[derive(Default)]
pub struct Triggers {
    on_stream_start: Vec<Hook>,
    on_stream_stop: Vec<Hook>,
    on_image: Vec<ImageHook>,
}

impl Triggers {
    pub fn add_stream_start(&mut self, f: impl FnMut() + Send + 'static) {
        self.on_stream_start.push(Box::new(f));
    }

    pub fn add_stream_stop(&mut self, f: impl FnMut() + Send + 'static) {
        self.on_stream_stop.push(Box::new(f));
    }

    pub fn add_image(&mut self, f: impl FnMut(&Frame) + Send + 'static) {
        self.on_image.push(Box::new(f));
    }

    pub(crate) fn stream_started(&mut self) {
        self.on_stream_start.iter_mut().for_each(|f| f());
    }

    pub(crate) fn stream_stopped(&mut self) {
        self.on_stream_stop.iter_mut().for_each(|f| f());
    }

    pub(crate) fn image(&mut self, frame: &Frame) {
        self.on_image.iter_mut().for_each(|f| f(frame));
    }
}

impl std::fmt::Debug for Triggers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Triggers")
            .field("on_stream_start", &self.on_stream_start.len())
            .field("on_stream_stop", &self.on_stream_stop.len())
            .field("on_image", &self.on_image.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn callbacks_run_in_registration_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut triggers = Triggers::default();
        for tag in ["a", "b"] {
            let log = log.clone();
            triggers.add_stream_start(move || log.lock().unwrap().push(tag));
        }
        let stop_log = log.clone();
        triggers.add_stream_stop(move || stop_log.lock().unwrap().push("stop"));

        triggers.stream_started();
        triggers.stream_stopped();
        assert_eq!(*log.lock().unwrap(), vec!["a", "b", "stop"]);
    }
}
