//! Effective channel permissions

use cord_core::{Channel, Guild, Member, OverwriteType, Permissions};

/// Permissions `member` ends up with in `channel`
///
/// Order: @everyone role, member roles, administrator override, @everyone
/// overwrite, role overwrites (all denies then all allows), member
/// overwrite. The guild owner always gets everything.
pub fn member_permissions(guild: &Guild, channel: &Channel, member: &Member) -> Permissions {
    let user_id = member.user_id();

    if guild.is_owner(user_id) {
        return Permissions::ALL;
    }

    let mut permissions = guild
        .everyone_role()
        .map_or_else(Permissions::empty, |role| role.permissions);

    permissions |= Permissions::combine(
        guild
            .roles
            .iter()
            .filter(|role| member.has_role(&role.id))
            .map(|role| role.permissions),
    );

    if permissions.contains(Permissions::ADMINISTRATOR) {
        permissions |= Permissions::ALL;
    }

    if let Some(everyone) = channel
        .permission_overwrites
        .iter()
        .find(|o| o.id == guild.id)
    {
        permissions = permissions.overwrite(everyone.deny, everyone.allow);
    }

    let (denies, allows) = channel
        .permission_overwrites
        .iter()
        .filter(|o| o.kind == OverwriteType::Role && member.has_role(&o.id))
        .fold((Permissions::empty(), Permissions::empty()), |(deny, allow), o| {
            (deny | o.deny, allow | o.allow)
        });
    permissions = permissions.overwrite(denies, allows);

    if let Some(own) = channel.overwrite_for(OverwriteType::Member, user_id) {
        permissions = permissions.overwrite(own.deny, own.allow);
    }

    if permissions.contains(Permissions::ADMINISTRATOR) {
        permissions |= Permissions::ALL_CHANNEL;
    }

    permissions
}
