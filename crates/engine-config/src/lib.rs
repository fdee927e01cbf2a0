pub mod error;
pub mod rules;
pub mod settings;

pub mod validation {
    pub mod finding;
    pub mod validator;
}
