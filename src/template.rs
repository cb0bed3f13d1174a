//! Email templates as a tagged sum type.
//!
//! Each variant carries its own typed data and renders to a subject and
//! HTML body through a single exhaustive match. Rendering happens at
//! submission time, before a job is created; the queue and the workers
//! only ever see the rendered text.

use serde::{Deserialize, Serialize};

use crate::job::EmailContext;

/// A rendered subject/body pair, ready to enqueue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderedEmail {
    pub subject: String,
    pub html: String,
}

/// Template-based email content.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "context", rename_all = "snake_case")]
pub enum EmailTemplate {
    /// A new message (or shared file) arrived in a thread.
    MessageReceived {
        thread_name: String,
        thread_link: String,
        sender_name: Option<String>,
        message_content: String,
        message_type: Option<String>,
        file_name: Option<String>,
    },
    /// A study was published and matches the recipient's site.
    StudyPublished {
        study_name: String,
        study_link: String,
        sponsor_name: Option<String>,
        study_description: Option<String>,
    },
    /// A site profile went live.
    SiteCreated {
        site_name: String,
        site_link: String,
        site_org_name: Option<String>,
        site_description: Option<String>,
    },
    /// A site submitted a proposal for a study.
    ProposalReceived {
        site_name: String,
        study_title: String,
        site_message: String,
        sponsor_contact_name: String,
        proposal_link: String,
    },
}

impl EmailTemplate {
    /// The classification tag this template corresponds to.
    pub fn context(&self) -> EmailContext {
        match self {
            EmailTemplate::MessageReceived { .. } => EmailContext::MessageReceived,
            EmailTemplate::StudyPublished { .. } => EmailContext::StudyPublished,
            EmailTemplate::SiteCreated { .. } => EmailContext::SiteCreated,
            EmailTemplate::ProposalReceived { .. } => EmailContext::ProposalReceived,
        }
    }

    /// Render the template into a subject and HTML body.
    pub fn render(&self) -> RenderedEmail {
        match self {
            EmailTemplate::MessageReceived {
                thread_name,
                thread_link,
                sender_name,
                message_content,
                message_type,
                file_name,
            } => {
                let is_file = message_type.as_deref() == Some("FILE") && file_name.is_some();
                let subject = if is_file {
                    format!(
                        "New file shared in {}: {}",
                        thread_name,
                        file_name.as_deref().unwrap_or_default()
                    )
                } else {
                    format!("New message in {}", thread_name)
                };
                let lead = match (is_file, sender_name) {
                    (true, _) => format!("You have received a new file in <strong>{thread_name}</strong>"),
                    (false, Some(sender)) => format!(
                        "<strong>{sender}</strong> sent you a message in <strong>{thread_name}</strong>"
                    ),
                    (false, None) => {
                        format!("You have unread messages for <strong>{thread_name}</strong>")
                    }
                };
                let content = if is_file {
                    format!(
                        "<p style=\"font-weight:bold\">File shared: {}</p>",
                        file_name.as_deref().unwrap_or_default()
                    )
                } else {
                    format!("<p style=\"font-style:italic\">{message_content}</p>")
                };
                RenderedEmail {
                    subject,
                    html: wrap_body(&format!(
                        "<p>{lead}</p>{content}{}",
                        action_button(thread_link, "View Conversation")
                    )),
                }
            }
            EmailTemplate::StudyPublished {
                study_name,
                study_link,
                sponsor_name,
                study_description,
            } => {
                let by = sponsor_name
                    .as_deref()
                    .map(|s| format!(" by <strong>{s}</strong>"))
                    .unwrap_or_default();
                let description = study_description
                    .as_deref()
                    .map(|d| format!("<p>{d}</p>"))
                    .unwrap_or_default();
                RenderedEmail {
                    subject: format!("Study Published: {study_name}"),
                    html: wrap_body(&format!(
                        "<p>A new study <strong>{study_name}</strong> was published{by}.</p>{description}{}",
                        action_button(study_link, "View Study")
                    )),
                }
            }
            EmailTemplate::SiteCreated {
                site_name,
                site_link,
                site_org_name,
                site_description,
            } => {
                let by = site_org_name
                    .as_deref()
                    .map(|o| format!(" by <strong>{o}</strong>"))
                    .unwrap_or_default();
                let description = site_description
                    .as_deref()
                    .map(|d| format!("<p>{d}</p>"))
                    .unwrap_or_default();
                RenderedEmail {
                    subject: format!("Site Published: {site_name}"),
                    html: wrap_body(&format!(
                        "<p>The site <strong>{site_name}</strong> is now live{by}.</p>{description}{}",
                        action_button(site_link, "View Site")
                    )),
                }
            }
            EmailTemplate::ProposalReceived {
                site_name,
                study_title,
                site_message,
                sponsor_contact_name,
                proposal_link,
            } => RenderedEmail {
                subject: format!("{site_name} Has Submitted a Proposal for {study_title}"),
                html: wrap_body(&format!(
                    "<p>Hi {sponsor_contact_name},</p>\
                     <p><strong>{site_name}</strong> has submitted a proposal for \
                     <strong>{study_title}</strong>.</p>\
                     <p style=\"font-style:italic\">{site_message}</p>{}",
                    action_button(proposal_link, "Review Proposal")
                )),
            },
        }
    }
}

fn wrap_body(inner: &str) -> String {
    format!(
        "<div style=\"font-family:Arial,sans-serif;padding:20px;background:#f4f4f4\">\
         <div style=\"max-width:600px;margin:0 auto;background-color:#ffffff;\
         border-radius:10px;padding:32px;text-align:center\">{inner}</div></div>"
    )
}

fn action_button(link: &str, label: &str) -> String {
    format!(
        "<a href=\"{link}\" style=\"display:inline-block;padding:12px 24px;\
         background-color:#2563eb;color:#ffffff;border-radius:6px;\
         text-decoration:none\">{label}</a>"
    )
}
