//! SeaORM entity models
//!
//! Database entities for the directory

mod category;
mod submission;

pub use submission::{
    Entity as SubmissionEntity,
    Model as Submission,
    ActiveModel as SubmissionActiveModel,
    Column as SubmissionColumn,
    SubmissionStatus,
};

pub use category::{
    Entity as CategoryEntity,
    Model as Category,
    ActiveModel as CategoryActiveModel,
    Column as CategoryColumn,
};
