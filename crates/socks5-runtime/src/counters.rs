//! The three process-wide counters the monitor's GET targets expose.

#[derive(Default)]
pub struct Counters {
    historic_connections: u32,
    current_connections: u32,
    transferred_bytes: u32,
}

impl Counters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_connection_established(&mut self) {
        self.historic_connections = self.historic_connections.wrapping_add(1);
        self.current_connections = self.current_connections.wrapping_add(1);
    }

    pub fn on_connection_closed(&mut self) {
        self.current_connections = self.current_connections.saturating_sub(1);
    }

    pub fn add_transferred(&mut self, bytes: u32) {
        self.transferred_bytes = self.transferred_bytes.wrapping_add(bytes);
    }

    pub fn historic_connections(&self) -> u32 {
        self.historic_connections
    }

    pub fn current_connections(&self) -> u32 {
        self.current_connections
    }

    pub fn transferred_bytes(&self) -> u32 {
        self.transferred_bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracks_connection_lifecycle() {
        let mut c = Counters::new();
        c.on_connection_established();
        c.on_connection_established();
        assert_eq!(c.historic_connections(), 2);
        assert_eq!(c.current_connections(), 2);
        c.on_connection_closed();
        assert_eq!(c.current_connections(), 1);
        assert_eq!(c.historic_connections(), 2);
    }

    #[test]
    fn current_connections_never_underflows() {
        let mut c = Counters::new();
        c.on_connection_closed();
        assert_eq!(c.current_connections(), 0);
    }
}
