use std::future::Future;

use teloxide::{
    requests::Requester,
    types::{ChatId, ChatMemberStatus, Recipient, UserId},
    Bot, RequestError,
};

/// Something that can tell whether a user is in a channel.
pub trait MembershipLookup {
    /// Status of the user in the channel with this handle, which is
    /// either a `@username` or a numeric chat ID.
    fn member_status(
        &self,
        handle: &str,
        user: UserId,
    ) -> impl Future<Output = Result<ChatMemberStatus, RequestError>> + Send;
}

impl MembershipLookup for Bot {
    async fn member_status(
        &self,
        handle: &str,
        user: UserId,
    ) -> Result<ChatMemberStatus, RequestError> {
        let member = self
            .get_chat_member(recipient_from_handle(handle), user)
            .await?;
        Ok(member.status())
    }
}

/// Returns `true` if this status means the user is actually in the channel.
pub fn is_subscribed_status(status: ChatMemberStatus) -> bool {
    matches!(
        status,
        ChatMemberStatus::Member | ChatMemberStatus::Administrator | ChatMemberStatus::Owner
    )
}

fn recipient_from_handle(handle: &str) -> Recipient {
    match handle.parse::<i64>() {
        Ok(id) => Recipient::Id(ChatId(id)),
        Err(_) => Recipient::ChannelUsername(handle.to_string()),
    }
}
