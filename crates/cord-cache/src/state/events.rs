//! Applying gateway events to the cache

use cord_core::Event;

use super::State;
use crate::error::StateResult;

impl State {
    /// Apply one event
    ///
    /// Takes the event mutably to fill the `before_*` snapshots of message
    /// and voice updates. Event kinds the cache does not track, and kinds
    /// whose tracking flag is off, are ignored.
    pub fn on_event(&self, event: &mut Event) -> StateResult<()> {
        if let Event::Ready(ready) = event {
            return self.on_ready(ready);
        }

        let config = self.config;
        if !config.enabled {
            return Ok(());
        }
        let track_messages = config.max_message_count != 0;

        match event {
            Event::GuildCreate(create) => self.guild_add(create.0.clone()),
            Event::GuildUpdate(update) => self.guild_add(update.0.clone()),
            Event::GuildDelete(delete) => self.guild_remove(&delete.id),

            Event::GuildMemberAdd(add) if config.track_members => self.member_add(add.0.clone()),
            Event::GuildMemberUpdate(update) if config.track_members => {
                self.member_add(update.0.clone())
            }
            Event::GuildMemberRemove(remove) if config.track_members => {
                self.member_remove(&remove.guild_id, remove.user_id())
            }
            Event::GuildMembersChunk(chunk) if config.track_members => {
                for member in &chunk.members {
                    let mut member = member.clone();
                    member.guild_id.clone_from(&chunk.guild_id);
                    self.member_add(member)?;
                }
                Ok(())
            }

            Event::GuildRoleCreate(create) if config.track_roles => {
                self.role_add(&create.guild_id, create.role.clone())
            }
            Event::GuildRoleUpdate(update) if config.track_roles => {
                self.role_add(&update.guild_id, update.role.clone())
            }
            Event::GuildRoleDelete(delete) if config.track_roles => {
                self.role_remove(&delete.guild_id, &delete.role_id)
            }

            Event::GuildEmojisUpdate(update) if config.track_emojis => {
                self.emojis_replace(&update.guild_id, update.emojis.clone())
            }

            Event::ChannelCreate(create) if config.track_channels => {
                self.channel_add(create.0.clone())
            }
            Event::ChannelUpdate(update) if config.track_channels => {
                self.channel_add(update.0.clone())
            }
            Event::ChannelDelete(delete) if config.track_channels => self.channel_remove(&delete.id),

            Event::MessageCreate(create) if track_messages => self.message_add(create.0.clone()),
            Event::MessageUpdate(update) if track_messages => {
                let message = &update.message;
                update.before_update = self.message(&message.channel_id, &message.id).ok();
                self.message_add(update.message.clone())
            }
            Event::MessageDelete(delete) if track_messages => {
                let message = &delete.message;
                delete.before_delete = self.message(&message.channel_id, &message.id).ok();
                self.message_remove(&delete.message)
            }
            Event::MessageDeleteBulk(bulk) if track_messages => {
                self.messages_remove(&bulk.channel_id, &bulk.messages)
            }

            Event::VoiceStateUpdate(update) if config.track_voice => {
                let voice = &update.voice_state;
                update.before_update = self.voice_state(&voice.guild_id, &voice.user_id).ok();
                self.voice_state_update(&update.voice_state)
            }

            Event::PresenceUpdate(update) => {
                let presence_result = if config.track_presences {
                    self.presence_add(&update.guild_id, &update.presence)
                } else {
                    Ok(())
                };
                if config.track_members {
                    self.member_from_presence(&update.guild_id, &update.presence)?;
                }
                presence_result
            }

            _ => Ok(()),
        }
    }
}
