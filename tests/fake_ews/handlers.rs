//! One function per EWS operation
//!
//! Each handler inspects the request body the client rendered and
//! answers with a full SOAP envelope, the way a real server would.
//! The server then runs that XML through `soap::parse_response`, so
//! the client sees exactly the structured shape a transport produces.

use super::mailbox::{Mailbox, TestEmail};

const ENVELOPE_OPEN: &str = r#"<?xml version="1.0" encoding="utf-8"?><s:Envelope xmlns:s="http://schemas.xmlsoap.org/soap/envelope/"><s:Body>"#;
const ENVELOPE_CLOSE: &str = "</s:Body></s:Envelope>";
const NAMESPACES: &str = r#"xmlns:m="http://schemas.microsoft.com/exchange/services/2006/messages" xmlns:t="http://schemas.microsoft.com/exchange/services/2006/types""#;

/// Value of attribute `name` on the first `<element ...>` in `xml`.
pub fn attribute<'a>(xml: &'a str, element: &str, name: &str) -> Option<&'a str> {
    let start = xml.find(&format!("<{element} "))?;
    let rest = &xml[start..];
    let tag = &rest[..rest.find('>')?];
    let key = format!(r#"{name}=""#);
    let value = &tag[tag.find(&key)? + key.len()..];
    Some(&value[..value.find('"')?])
}

/// Folder id named inside `ParentFolderIds`.
fn parent_folder(request: &str) -> Option<&str> {
    attribute(request, "t:DistinguishedFolderId", "Id")
        .or_else(|| attribute(request, "t:FolderId", "Id"))
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn wrap(operation: &str, message: &str) -> String {
    format!(
        "{ENVELOPE_OPEN}<m:{operation}Response {NAMESPACES}><m:ResponseMessages>{message}</m:ResponseMessages></m:{operation}Response>{ENVELOPE_CLOSE}"
    )
}

fn error_message(operation: &str, code: &str, text: &str) -> String {
    wrap(
        operation,
        &format!(
            r#"<m:{operation}ResponseMessage ResponseClass="Error"><m:MessageText>{text}</m:MessageText><m:ResponseCode>{code}</m:ResponseCode><m:DescriptiveLinkKey>0</m:DescriptiveLinkKey></m:{operation}ResponseMessage>"#
        ),
    )
}

fn mailbox_xml(name: &str, address: &str) -> String {
    format!(
        "<t:Mailbox><t:Name>{}</t:Name><t:EmailAddress>{}</t:EmailAddress><t:RoutingType>SMTP</t:RoutingType></t:Mailbox>",
        escape(name),
        escape(address)
    )
}

/// The `Default` shape as returned by `FindItem`.
fn brief_fields(email: &TestEmail) -> String {
    format!(
        r#"<t:ItemId Id="{id}" ChangeKey="CK-{id}"/><t:Subject>{subject}</t:Subject><t:Sensitivity>Normal</t:Sensitivity><t:Size>{size}</t:Size><t:DateTimeSent>{sent}</t:DateTimeSent><t:DateTimeCreated>{sent}</t:DateTimeCreated><t:HasAttachments>false</t:HasAttachments><t:From>{from}</t:From><t:IsRead>{read}</t:IsRead>"#,
        id = escape(&email.id),
        subject = escape(&email.subject),
        size = email.size(),
        sent = email.sent,
        from = mailbox_xml(&email.from_name, &email.from_address),
        read = email.read,
    )
}

/// FindItem: indexed paging over the named folder.
pub fn find_item(mailbox: &Mailbox, request: &str) -> String {
    let Some(folder) = parent_folder(request).and_then(|id| mailbox.get_folder(id)) else {
        return error_message(
            "FindItem",
            "ErrorFolderNotFound",
            "The specified folder could not be found in the store.",
        );
    };

    let max: usize = attribute(request, "m:IndexedPageItemView", "MaxEntriesReturned")
        .and_then(|v| v.parse().ok())
        .unwrap_or(usize::MAX);
    let offset: usize = attribute(request, "m:IndexedPageItemView", "Offset")
        .and_then(|v| v.parse().ok())
        .unwrap_or(0);
    let from_end = attribute(request, "m:IndexedPageItemView", "BasePoint") == Some("End");

    let total = folder.emails.len();
    let (start, end) = if from_end {
        let end = total.saturating_sub(offset);
        (end.saturating_sub(max), end)
    } else {
        let start = offset.min(total);
        (start, start.saturating_add(max).min(total))
    };
    let page = &folder.emails[start..end];

    let items = if page.is_empty() {
        "<t:Items/>".to_string()
    } else {
        let messages: String = page
            .iter()
            .map(|e| format!("<t:{kind}>{}</t:{kind}>", brief_fields(e), kind = e.kind))
            .collect();
        format!("<t:Items>{messages}</t:Items>")
    };
    let includes_last = if from_end { start == 0 } else { end == total };
    let next_offset = offset + page.len();

    wrap(
        "FindItem",
        &format!(
            r#"<m:FindItemResponseMessage ResponseClass="Success"><m:ResponseCode>NoError</m:ResponseCode><m:RootFolder IndexedPagingOffset="{next_offset}" TotalItemsInView="{total}" IncludesLastItemInRange="{includes_last}">{items}</m:RootFolder></m:FindItemResponseMessage>"#
        ),
    )
}

/// GetItem: the full message, MIME content included.
pub fn get_item(mailbox: &Mailbox, request: &str) -> String {
    let Some(email) = attribute(request, "t:ItemId", "Id").and_then(|id| mailbox.find_email(id))
    else {
        return error_message(
            "GetItem",
            "ErrorItemNotFound",
            "The specified object was not found in the store.",
        );
    };

    let recipients: String = email.to.iter().map(|to| mailbox_xml("", to)).collect();
    wrap(
        "GetItem",
        &format!(
            r#"<m:GetItemResponseMessage ResponseClass="Success"><m:ResponseCode>NoError</m:ResponseCode><m:Items><t:{kind}><t:MimeContent CharacterSet="UTF-8">RnJvbTogYWxpY2VAZXhhbXBsZS5jb20=</t:MimeContent>{brief}<t:Body BodyType="HTML">{body}</t:Body><t:Importance>Normal</t:Importance><t:ToRecipients>{recipients}</t:ToRecipients></t:{kind}></m:Items></m:GetItemResponseMessage>"#,
            brief = brief_fields(email),
            body = escape(&email.body),
            kind = email.kind,
        ),
    )
}

/// CreateItem: accept anything that names a message.
pub fn create_item(request: &str) -> String {
    if !request.contains("<t:Message>") {
        return error_message("CreateItem", "ErrorInvalidRequest", "No items to create.");
    }
    wrap(
        "CreateItem",
        r#"<m:CreateItemResponseMessage ResponseClass="Success"><m:ResponseCode>NoError</m:ResponseCode><m:Items/></m:CreateItemResponseMessage>"#,
    )
}

/// FindFolder: direct children of the named folder.
pub fn find_folder(mailbox: &Mailbox, request: &str) -> String {
    let Some(parent) = parent_folder(request).filter(|id| mailbox.get_folder(id).is_some()) else {
        return error_message(
            "FindFolder",
            "ErrorFolderNotFound",
            "The specified folder could not be found in the store.",
        );
    };

    let folders: String = mailbox
        .children_of(parent)
        .map(|folder| {
            let unread = folder.emails.iter().filter(|e| !e.read).count();
            let children = mailbox.children_of(&folder.id).count();
            format!(
                r#"<t:Folder><t:FolderId Id="{id}" ChangeKey="AQAAAA=="/><t:DisplayName>{name}</t:DisplayName><t:TotalCount>{total}</t:TotalCount><t:ChildFolderCount>{children}</t:ChildFolderCount><t:UnreadCount>{unread}</t:UnreadCount></t:Folder>"#,
                id = escape(&folder.id),
                name = escape(&folder.name),
                total = folder.emails.len(),
            )
        })
        .collect();
    let folders = if folders.is_empty() {
        "<t:Folders/>".to_string()
    } else {
        format!("<t:Folders>{folders}</t:Folders>")
    };

    wrap(
        "FindFolder",
        &format!(
            r#"<m:FindFolderResponseMessage ResponseClass="Success"><m:ResponseCode>NoError</m:ResponseCode><m:RootFolder IncludesLastItemInRange="true">{folders}</m:RootFolder></m:FindFolderResponseMessage>"#
        ),
    )
}
