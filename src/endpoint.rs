use std::{fmt, time::Duration};

pub const DEFAULT_PORT: u16 = 5672;
pub const DEFAULT_CONNECTION_TIMEOUT: Duration = Duration::from_millis(1000);
pub const DEFAULT_HEARTBEAT: Duration = Duration::from_secs(1);

/// One candidate broker address.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Address {
    pub host: String,
    pub port: u16,
}

impl Address {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Where and how to reach the broker cluster.
///
/// `hosts` is the raw, comma separated host value of the test plan. Every host shares the
/// same port, virtual host, credentials, timeout and heartbeat.
#[derive(Clone, PartialEq, Eq)]
pub struct BrokerEndpoint {
    pub hosts: String,
    pub port: u16,
    pub virtual_host: String,
    pub username: String,
    pub password: String,
    pub connection_timeout: Duration,
    pub heartbeat: Duration,
}

impl Default for BrokerEndpoint {
    fn default() -> Self {
        BrokerEndpoint {
            hosts: "localhost".to_owned(),
            port: DEFAULT_PORT,
            virtual_host: "/".to_owned(),
            username: "guest".to_owned(),
            password: "guest".to_owned(),
            connection_timeout: DEFAULT_CONNECTION_TIMEOUT,
            heartbeat: DEFAULT_HEARTBEAT,
        }
    }
}

impl fmt::Debug for BrokerEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BrokerEndpoint")
            .field("hosts", &self.hosts)
            .field("port", &self.port)
            .field("virtual_host", &self.virtual_host)
            .field("username", &self.username)
            .field("password", &"****")
            .field("connection_timeout", &self.connection_timeout)
            .field("heartbeat", &self.heartbeat)
            .finish()
    }
}

impl BrokerEndpoint {
    pub fn new(hosts: impl Into<String>) -> Self {
        Self {
            hosts: hosts.into(),
            ..Default::default()
        }
    }

    /// Failover candidates in configured order.
    pub fn addresses(&self) -> Vec<Address> {
        self.hosts
            .split(',')
            .map(str::trim)
            .filter(|host| !host.is_empty())
            .map(|host| Address::new(host, self.port))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::{Address, BrokerEndpoint};

    #[test]
    fn splits_hosts_in_order() {
        let endpoint = BrokerEndpoint::new("a,b,c");

        assert_eq!(
            vec![
                Address::new("a", 5672),
                Address::new("b", 5672),
                Address::new("c", 5672)
            ],
            endpoint.addresses()
        );
    }

    #[test]
    fn trims_and_skips_empty_hosts() {
        let endpoint = BrokerEndpoint {
            port: 5671,
            ..BrokerEndpoint::new(" rabbit-1 ,, rabbit-2,")
        };

        let addresses: Vec<String> = endpoint.addresses().iter().map(|a| a.to_string()).collect();

        assert_eq!(vec!["rabbit-1:5671", "rabbit-2:5671"], addresses);
    }

    #[test]
    fn blank_hosts_yield_no_address() {
        assert!(BrokerEndpoint::new("  ").addresses().is_empty());
    }

    #[test]
    fn debug_hides_password() {
        let endpoint = BrokerEndpoint {
            password: "s3cret".to_owned(),
            ..Default::default()
        };

        assert!(!format!("{:?}", endpoint).contains("s3cret"));
    }
}
