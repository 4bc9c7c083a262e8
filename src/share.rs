//! Outbound referral share payloads, plus the clipboard the copy channels
//! write to.

use std::io::{self, IsTerminal, Stdout, Write};
use std::time::{Duration, Instant};

use clap::ValueEnum;
use crossterm::clipboard::CopyToClipboard;
use crossterm::execute;
use urlencoding::encode;

use crate::error::{CareError, CareResult};

/// Builds `{origin}/register?ref={code}`.
pub fn referral_link(origin: &str, code: &str) -> String {
    format!("{}/register?ref={}", origin.trim_end_matches('/'), encode(code))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Channel {
    /// Plain invitation text.
    Message,
    Whatsapp,
    Telegram,
    Email,
    Twitter,
    Facebook,
    Linkedin,
    #[value(name = "copy-code")]
    CopyCode,
    #[value(name = "copy-link")]
    CopyLink,
}

impl Channel {
    pub const ALL: [Channel; 9] = [
        Channel::Message,
        Channel::Whatsapp,
        Channel::Telegram,
        Channel::Email,
        Channel::Twitter,
        Channel::Facebook,
        Channel::Linkedin,
        Channel::CopyCode,
        Channel::CopyLink,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Channel::Message => "Message",
            Channel::Whatsapp => "WhatsApp",
            Channel::Telegram => "Telegram",
            Channel::Email => "Email",
            Channel::Twitter => "Twitter",
            Channel::Facebook => "Facebook",
            Channel::Linkedin => "LinkedIn",
            Channel::CopyCode => "Copy code",
            Channel::CopyLink => "Copy link",
        }
    }

    /// Channels whose payload is meant for the clipboard.
    pub fn is_copy(&self) -> bool {
        matches!(self, Channel::CopyCode | Channel::CopyLink | Channel::Message)
    }
}

/// What is being shared and by whom.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShareContext {
    pub code: String,
    pub link: String,
    pub display_name: String,
    pub app_name: String,
}

impl ShareContext {
    pub fn new(code: &str, origin: &str, display_name: &str, app_name: &str) -> ShareContext {
        ShareContext {
            code: code.to_string(),
            link: referral_link(origin, code),
            display_name: display_name.to_string(),
            app_name: app_name.to_string(),
        }
    }

    pub fn message(&self) -> String {
        format!(
            "{} invited you to join {}! Sign up with referral code {} at {}",
            self.display_name, self.app_name, self.code, self.link
        )
    }

    pub fn mail_subject(&self) -> String {
        format!("Join me on {}", self.app_name)
    }

    pub fn mail_body(&self) -> String {
        format!(
            "Hi,\n\n{}\n\nBest regards,\n{}",
            self.message(),
            self.display_name
        )
    }

    pub fn payload(&self, channel: Channel) -> SharePayload {
        let text = self.message();
        match channel {
            Channel::Message => SharePayload::Text(text),
            Channel::CopyCode => SharePayload::Text(self.code.clone()),
            Channel::CopyLink => SharePayload::Text(self.link.clone()),
            Channel::Whatsapp => SharePayload::Url(format!("https://wa.me/?text={}", encode(&text))),
            Channel::Telegram => SharePayload::Url(format!(
                "https://t.me/share/url?url={}&text={}",
                encode(&self.link),
                encode(&text)
            )),
            Channel::Twitter => SharePayload::Url(format!(
                "https://twitter.com/intent/tweet?text={}",
                encode(&text)
            )),
            Channel::Facebook => SharePayload::Url(format!(
                "https://www.facebook.com/sharer/sharer.php?u={}",
                encode(&self.link)
            )),
            Channel::Linkedin => SharePayload::Url(format!(
                "https://www.linkedin.com/sharing/share-offsite/?url={}",
                encode(&self.link)
            )),
            Channel::Email => {
                let subject = self.mail_subject();
                let body = self.mail_body();
                let url = format!("mailto:?subject={}&body={}", encode(&subject), encode(&body));
                SharePayload::Mail { subject, body, url }
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SharePayload {
    Text(String),
    Url(String),
    Mail { subject: String, body: String, url: String },
}

impl SharePayload {
    /// The single string handed to the clipboard or opened by the platform.
    pub fn as_str(&self) -> &str {
        match self {
            SharePayload::Text(s) | SharePayload::Url(s) => s,
            SharePayload::Mail { url, .. } => url,
        }
    }
}

/// Where clipboard channels put their payload.
pub trait Clipboard {
    fn copy(&mut self, text: &str) -> CareResult<()>;
}

/// Sets the system clipboard through the terminal with an OSC 52 sequence.
/// Works over SSH as long as the terminal honours the sequence.
pub struct Osc52Clipboard<W: Write> {
    out: W,
    attached: bool,
}

impl Osc52Clipboard<Stdout> {
    /// Writes to stdout. Copies are refused when stdout is not a terminal.
    pub fn stdout() -> Osc52Clipboard<Stdout> {
        let out = io::stdout();
        let attached = out.is_terminal();
        Osc52Clipboard { out, attached }
    }
}

impl<W: Write> Osc52Clipboard<W> {
    pub fn new(out: W) -> Osc52Clipboard<W> {
        Osc52Clipboard { out, attached: true }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> Clipboard for Osc52Clipboard<W> {
    fn copy(&mut self, text: &str) -> CareResult<()> {
        if !self.attached {
            return Err(CareError::Clipboard("stdout is not a terminal".into()));
        }
        execute!(self.out, CopyToClipboard::to_clipboard_from(text))?;
        Ok(())
    }
}

/// Transient "copied" acknowledgment.
#[derive(Debug, Clone, Copy)]
pub struct CopyNotice {
    shown_at: Option<Instant>,
    ttl: Duration,
}

impl CopyNotice {
    pub fn new(ttl: Duration) -> CopyNotice {
        CopyNotice { shown_at: None, ttl }
    }

    pub fn show(&mut self, at: Instant) {
        self.shown_at = Some(at);
    }

    /// Whether the acknowledgment is still on screen. Clears itself once
    /// the ttl has passed.
    pub fn is_visible(&mut self, at: Instant) -> bool {
        match self.shown_at {
            Some(t) if at.saturating_duration_since(t) < self.ttl => true,
            Some(_) => {
                self.shown_at = None;
                false
            }
            None => false,
        }
    }
}
