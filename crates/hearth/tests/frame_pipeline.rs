//! # Frame Pipeline Tests
//!
//! Message queue ordering, parallel update ranges and multi-world frames.
//!
//! Run with: cargo test --package hearth --test frame_pipeline

use std::sync::Arc;

use hearth::core::scene::{
    Component, ComponentContext, GameObjectDesc, Message, MsgQueueType, UpdateFunctionDesc, UpdatePhase, World,
    WorldDesc,
};
use hearth::core::WorldError;
use hearth::gameplay::{self, BakePreviewComponent};
use hearth::{GameLoop, GameLoopConfig};
use parking_lot::Mutex;

#[derive(Debug)]
struct Tagged(&'static str);
impl Message for Tagged {}

/// Records every tagged message with the frame it arrived in.
#[derive(Default)]
struct Journal {
    entries: Arc<Mutex<Vec<(u64, &'static str)>>>,
}

impl Component for Journal {
    fn handle_message(&mut self, message: &mut dyn Message, ctx: &mut ComponentContext<'_>) -> bool {
        let Some(tagged) = message.downcast_ref::<Tagged>() else {
            return false;
        };
        self.entries.lock().push((ctx.view().frame(), tagged.0));
        true
    }
}

#[derive(Default)]
struct Counter {
    visits: u32,
}

impl Component for Counter {}

fn new_world(index: u8) -> World {
    World::new(WorldDesc {
        name: format!("pipeline{index}"),
        index,
        ..WorldDesc::default()
    })
}

#[test]
fn next_frame_is_delivered_once_before_after_initialized() {
    let mut world = new_world(0);
    let entries = Arc::new(Mutex::new(Vec::new()));
    let object = world.create_object(GameObjectDesc::new("journal")).unwrap();
    world
        .create_component(
            object,
            Journal {
                entries: Arc::clone(&entries),
            },
        )
        .unwrap();
    world.update(0.016);
    let posted_in = world.frame();

    world.post_message(object, Tagged("after_initialized"), MsgQueueType::AfterInitialized);
    world.post_message(object, Tagged("next_frame"), MsgQueueType::NextFrame);

    world.update(0.016);
    world.update(0.016);

    let entries = entries.lock().clone();
    assert_eq!(
        entries,
        vec![(posted_in + 1, "next_frame"), (posted_in + 1, "after_initialized")]
    );
}

#[test]
fn post_async_and_post_transform_arrive_in_frame_order() {
    let mut world = new_world(0);
    let entries = Arc::new(Mutex::new(Vec::new()));
    let object = world.create_object(GameObjectDesc::new("journal")).unwrap();
    world
        .create_component(
            object,
            Journal {
                entries: Arc::clone(&entries),
            },
        )
        .unwrap();
    world.update(0.016);

    world.post_message(object, Tagged("post_transform"), MsgQueueType::PostTransform);
    world.post_message(object, Tagged("post_async"), MsgQueueType::PostAsync);
    world.update(0.016);

    let tags: Vec<&str> = entries.lock().iter().map(|&(_, tag)| tag).collect();
    assert_eq!(tags, vec!["post_async", "post_transform"]);
}

#[test]
fn update_ranges_cover_every_component_once() {
    let mut world = new_world(0);
    let ranges = Arc::new(Mutex::new(Vec::new()));
    let recorded = Arc::clone(&ranges);
    world
        .register_update_function(
            UpdateFunctionDesc::<Counter>::new("count", UpdatePhase::Async, move |range, ctx| {
                recorded.lock().push((ctx.first_component_index, ctx.component_count));
                for slot in range.iter_mut() {
                    slot.visits += 1;
                }
            })
            .with_granularity(50),
        )
        .unwrap();

    for i in 0..100 {
        let object = world.create_object(GameObjectDesc::new(format!("n{i}"))).unwrap();
        world.create_component(object, Counter::default()).unwrap();
    }
    world.update(0.016);

    let mut ranges = ranges.lock().clone();
    ranges.sort_unstable();
    assert_eq!(ranges, vec![(0, 50), (50, 50)]);

    let manager = world.manager::<Counter>().unwrap();
    assert_eq!(manager.len(), 100);
    assert!(manager.iter().all(|slot| slot.visits == 1));
}

#[test]
fn deferred_commands_apply_at_barrier() {
    let mut world = new_world(0);
    world
        .register_update_function(UpdateFunctionDesc::<Counter>::new(
            "cull",
            UpdatePhase::PreAsync,
            |range, ctx| {
                for slot in range.iter_mut() {
                    slot.visits += 1;
                    if slot.visits == 2 {
                        ctx.view.commands().delete_object_delayed(slot.owner());
                    }
                }
            },
        ))
        .unwrap();

    let object = world.create_object(GameObjectDesc::new("short-lived")).unwrap();
    world.create_component(object, Counter::default()).unwrap();

    world.update(0.016);
    assert!(world.contains_object(object));
    world.update(0.016);
    assert!(!world.contains_object(object));
}

#[test]
fn game_loop_drives_independent_worlds() {
    let mut game_loop = GameLoop::new(GameLoopConfig::default());
    for index in [0, 1] {
        let world = game_loop.add_world(WorldDesc {
            name: format!("w{index}"),
            index,
            ..WorldDesc::default()
        });
        let world = world.unwrap();
        gameplay::register_components(world).unwrap();
        let owner = world.create_object(GameObjectDesc::new("preview")).unwrap();
        world.create_component(owner, BakePreviewComponent::with_resolution(4)).unwrap();
    }

    let stats = game_loop.step(0.016);
    assert_eq!(stats.worlds, 2);

    // One singleton per world, never shared.
    for index in [0, 1] {
        let world = game_loop.world_mut(index).unwrap();
        assert!(world.singleton::<BakePreviewComponent>().is_some());
        let extra = world.create_object(GameObjectDesc::new("extra")).unwrap();
        let result = world.create_component(extra, BakePreviewComponent::default());
        assert!(matches!(result, Err(WorldError::SingletonAlreadyExists { .. })));
    }
}
