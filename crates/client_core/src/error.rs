use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("username and password are required")]
    MissingCredentials,
    #[error("an operator is already signed in")]
    AlreadyAuthenticated,
    #[error("invalid credentials")]
    InvalidCredentials,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AccessError {
    #[error("no operator is signed in")]
    NotAuthenticated,
    #[error("only administrators can manage users")]
    AuthorizationDenied,
    #[error("no emitter is associated with the current operator")]
    MissingIssuerContext,
}

#[derive(Debug, Error)]
pub enum UserAdminError {
    #[error(transparent)]
    Access(#[from] AccessError),
    #[error("user directory request failed: {0}")]
    Request(String),
}
