mod requests;

pub use requests::{
    CommentForm, FormErrors, ImageUpload, LoginForm, PaginationParams, PostForm, SignupForm,
    ValidPost, NON_FIELD_ERRORS, REQUIRED_MESSAGE,
};
