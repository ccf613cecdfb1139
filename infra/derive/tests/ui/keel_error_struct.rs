use keel_derive::keel_error;

#[keel_error]
pub struct DemoError {
    message: String,
}

fn main() {}
