use envconfig::Envconfig;
use startup::ReloadPolicy;

#[derive(Envconfig, Clone)]
pub struct Config {
    #[envconfig(from = "BIND_HOST", default = "0.0.0.0")]
    pub host: String,

    #[envconfig(from = "BIND_PORT", default = "3310")]
    pub port: u16,

    #[envconfig(default = "startup-api")]
    pub service_name: String,

    /// What a bundle reload does to the timing baseline: PRESERVE or REBASELINE.
    #[envconfig(default = "preserve")]
    pub reload_policy: ReloadPolicy,

    /// When false, the app_startup measurement is not served.
    #[envconfig(default = "true")]
    pub track_startup: bool,

    /// Count this service's own boot as the first bundle load.
    #[envconfig(default = "true")]
    pub signal_on_boot: bool,
}

impl Config {
    pub fn bind(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
