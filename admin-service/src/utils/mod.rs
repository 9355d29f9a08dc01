pub mod password;
pub mod validation;

pub use password::{
    Argon2Verifier, BcryptVerifier, CredentialVerifier, HashScheme, Password, PasswordHashString,
    PasswordHasherSet, Verification,
};
pub use validation::ValidatedJson;
