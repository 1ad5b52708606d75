pub mod init;
pub mod mailer;
