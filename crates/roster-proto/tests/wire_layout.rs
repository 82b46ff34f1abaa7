//! Wire layout tests.
//!
//! The server and other clients parse these records by field number, so the
//! exact bytes of small records are pinned here. A failure means a field was
//! renumbered or retyped.

use insta::assert_snapshot;
use prost::Message;
use roster_proto::wire::{
    AccessControl, AccessRequired, AddBannedMemberAction, BannedMember, DeleteMemberAction, Group,
    GroupAttributeBlob, GroupChange, GroupChangeActions, ModifyTitleAction,
    PromotePendingPniAciMemberProfileKeyAction, group_attribute_blob::Content,
};

fn encoded<M: Message>(message: &M) -> String {
    hex::encode(message.encode_to_vec())
}

#[test]
fn title_action_layout() {
    let action = ModifyTitleAction { title: b"hi".to_vec() };
    assert_snapshot!(encoded(&action), @"0a026869");
}

#[test]
fn actions_revision_and_delete_members_layout() {
    let actions = GroupChangeActions {
        revision: 14,
        delete_members: vec![DeleteMemberAction { deleted_user_id: vec![0xaa, 0xaa] }],
        ..Default::default()
    };
    assert_snapshot!(encoded(&actions), @"100e22040a02aaaa");
}

#[test]
fn highest_action_field_is_twenty_four() {
    let actions = GroupChangeActions {
        promote_pending_pni_aci_members: vec![PromotePendingPniAciMemberProfileKeyAction {
            pni: vec![0x01],
            ..Default::default()
        }],
        ..Default::default()
    };
    assert_snapshot!(encoded(&actions), @"c201031a0101");
}

#[test]
fn banned_member_action_layout() {
    let actions = GroupChangeActions {
        add_banned_members: vec![AddBannedMemberAction {
            added: Some(BannedMember { user_id: vec![7], timestamp: 0 }),
        }],
        ..Default::default()
    };
    assert_snapshot!(encoded(&actions), @"b201050a030a0107");
}

#[test]
fn group_revision_and_bans_layout() {
    let group = Group { revision: 13, ..Default::default() };
    assert_snapshot!(encoded(&group), @"300d");

    let group = Group {
        banned_members: vec![BannedMember { user_id: Vec::new(), timestamp: 1 }],
        ..Default::default()
    };
    assert_snapshot!(encoded(&group), @"6a021001");
}

#[test]
fn access_control_layout() {
    let access = AccessControl {
        attributes: AccessRequired::Member as i32,
        members: AccessRequired::Administrator as i32,
        add_from_invite_link: AccessRequired::Unsatisfiable as i32,
    };
    assert_snapshot!(encoded(&access), @"080210031804");
}

#[test]
fn change_envelope_epoch_layout() {
    let change = GroupChange { change_epoch: 5, ..Default::default() };
    assert_snapshot!(encoded(&change), @"1805");
}

#[test]
fn attribute_blob_timer_layout() {
    let blob = GroupAttributeBlob { content: Some(Content::DisappearingMessagesDuration(60)) };
    assert_snapshot!(encoded(&blob), @"183c");
}

#[test]
fn unknown_fields_are_skipped() {
    // Field 99, varint 1, followed by revision 3.
    let bytes = hex::decode("98060110 03".replace(' ', "")).unwrap();
    let actions = GroupChangeActions::decode(bytes.as_slice()).unwrap();

    assert_eq!(actions.revision, 3);
}
