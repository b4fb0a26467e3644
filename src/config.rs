/// Settings fixed when a binding is created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindingConfig {
    /// Ordinal reported in tensor views handed to the tensor library.
    pub device_id: usize,
    /// Read-only flag published with the input descriptor's data pointer.
    pub read_only: bool,
}

impl Default for BindingConfig {
    fn default() -> Self {
        Self {
            device_id: 0,
            read_only: false,
        }
    }
}

impl BindingConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_device_id(mut self, device_id: usize) -> Self {
        self.device_id = device_id;
        self
    }

    pub fn with_read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }
}
