//! Verification mail body.

use link_core::OutgoingEmail;

/// Render the message carrying a registration verification code.
pub fn verification_email(to: &str, subject: &str, code: &str, valid_minutes: u64) -> OutgoingEmail {
    let text_body = format!(
        "Your SAST Link verification code is {code}.\n\
         It is valid for {valid_minutes} minutes. If you did not request it, ignore this mail.\n"
    );
    let html_body = format!(
        "<!DOCTYPE html>\
         <html><body style=\"font-family:sans-serif\">\
         <p>Your SAST Link verification code is:</p>\
         <p style=\"font-size:24px;font-weight:bold;letter-spacing:4px\">{code}</p>\
         <p>It is valid for {valid_minutes} minutes. If you did not request it, ignore this mail.</p>\
         </body></html>"
    );

    OutgoingEmail {
        to: to.to_string(),
        subject: subject.to_string(),
        text_body,
        html_body,
    }
}
