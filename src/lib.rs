pub mod constants;
pub mod errors;
pub mod relay;

pub mod managers {
    pub mod composer;
    pub mod harness;
    pub mod normalizer;
    pub mod registry;
    pub mod relay;
    pub mod resolver;
}

pub mod services {
    pub mod config;
    pub mod logger;
    pub mod validation;
}

pub mod utils {
    pub mod feature_flags;
    pub mod redact;
    pub mod suggest;
}
