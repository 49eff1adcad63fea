/// Credential handling
///
/// - `password`: Argon2id hashing for user registration

pub mod password;
