use super::{Camera, CameraError};

/// Every camera the SDK reported, with at most one selected at a time.
///
/// Owned by the worker thread. Selecting a camera closes the session of the
/// previously selected one first; dropping the registry closes whatever is
/// still open.
pub struct CameraRegistry {
    cameras: Vec<Box<dyn Camera>>,
    active: Option<usize>,
}

impl CameraRegistry {
    pub fn new(cameras: Vec<Box<dyn Camera>>) -> Self {
        tracing::info!("Camera registry holds {} camera(s)", cameras.len());
        Self {
            cameras,
            active: None,
        }
    }

    pub fn names(&self) -> Vec<String> {
        self.cameras.iter().map(|c| c.name().to_string()).collect()
    }

    pub fn select(&mut self, index: usize) -> Result<(), CameraError> {
        if index >= self.cameras.len() {
            return Err(CameraError::InvalidIndex(index));
        }
        if self.active == Some(index) {
            return Ok(());
        }

        self.deselect();

        let camera = &mut self.cameras[index];
        tracing::info!("Selecting camera {}", camera.name());
        if !camera.available() {
            return Err(CameraError::Session(format!("{} is not available", camera.name())));
        }
        camera.open_session()?;
        self.active = Some(index);
        Ok(())
    }

    /// Select the first camera, as done at start-up.
    pub fn select_first(&mut self) -> Result<(), CameraError> {
        if self.cameras.is_empty() {
            return Err(CameraError::NoCamera);
        }
        self.select(0)
    }

    pub fn deselect(&mut self) {
        if let Some(index) = self.active.take() {
            let camera = &mut self.cameras[index];
            tracing::info!("Deselecting camera {}", camera.name());
            if let Err(e) = camera.close_session() {
                tracing::warn!("Could not close camera session: {}", e);
            }
        }
    }

    pub fn active(&self) -> Result<&dyn Camera, CameraError> {
        let index = self.active.ok_or(CameraError::NoActiveCamera)?;
        Ok(self.cameras[index].as_ref())
    }

    pub fn active_mut(&mut self) -> Result<&mut (dyn Camera + 'static), CameraError> {
        let index = self.active.ok_or(CameraError::NoActiveCamera)?;
        Ok(self.cameras[index].as_mut())
    }
}

impl Drop for CameraRegistry {
    fn drop(&mut self) {
        self.deselect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::Property;
    use crate::raw::CapturedImage;
    use std::sync::{Arc, Mutex};

    struct Recorder {
        name: String,
        log: Arc<Mutex<Vec<String>>>,
    }

    impl Camera for Recorder {
        fn name(&self) -> &str {
            &self.name
        }
        fn open_session(&mut self) -> Result<(), CameraError> {
            self.log.lock().unwrap().push(format!("open {}", self.name));
            Ok(())
        }
        fn close_session(&mut self) -> Result<(), CameraError> {
            self.log.lock().unwrap().push(format!("close {}", self.name));
            Ok(())
        }
        fn shoot(&self) -> Result<(), CameraError> {
            Ok(())
        }
        fn ready_to_shoot(&self) -> bool {
            true
        }
        fn retrieve_last_image(&self) -> CapturedImage {
            CapturedImage::failed()
        }
        fn property(&self, _: Property) -> Result<i32, CameraError> {
            Ok(0)
        }
        fn set_property(&mut self, _: Property, _: i32) -> Result<(), CameraError> {
            Ok(())
        }
        fn enumerate(&self, _: Property) -> Result<Vec<i32>, CameraError> {
            Ok(Vec::new())
        }
    }

    fn registry(log: &Arc<Mutex<Vec<String>>>) -> CameraRegistry {
        let cameras = ["a", "b"]
            .iter()
            .map(|name| {
                Box::new(Recorder {
                    name: name.to_string(),
                    log: Arc::clone(log),
                }) as Box<dyn Camera>
            })
            .collect();
        CameraRegistry::new(cameras)
    }

    #[test]
    fn selecting_closes_previous_session_first() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut cameras = registry(&log);

        cameras.select(0).unwrap();
        cameras.select(1).unwrap();
        assert_eq!(cameras.active().unwrap().name(), "b");
        assert_eq!(*log.lock().unwrap(), vec!["open a", "close a", "open b"]);
    }

    #[test]
    fn drop_closes_active_session() {
        let log = Arc::new(Mutex::new(Vec::new()));
        registry(&log).select(1).unwrap();
        assert_eq!(*log.lock().unwrap(), vec!["open b", "close b"]);
    }

    #[test]
    fn no_selection_means_no_camera() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut cameras = registry(&log);
        assert_eq!(cameras.active().err(), Some(CameraError::NoActiveCamera));
        assert_eq!(cameras.select(5), Err(CameraError::InvalidIndex(5)));
        assert_eq!(CameraRegistry::new(Vec::new()).select_first(), Err(CameraError::NoCamera));
    }
}
