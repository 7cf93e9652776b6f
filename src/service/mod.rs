//! CrudService: generic repository using the safe SQL builder, plus request validation.

mod crud;
pub mod validation;
pub use crud::CrudService;
pub use validation::{Mode, RequestValidator, Validated};
