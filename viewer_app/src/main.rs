//! Headless viewer demo
//!
//! Drives the engine end to end without a window or GPU: builds a small
//! scene, produces frames from the main thread while a render thread
//! drains the command queue, switches rendering techniques mid-run,
//! hot-reloads the active implementation, and saves a screenshot.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;

use lucent_engine::prelude::*;
use lucent_engine::render::{DrawInfo, UiConf};

const TARGET_SIZE: (u32, u32) = (320, 180);
const FRAMES: u32 = 120;

fn cube_mesh(material: Arc<Material>) -> Arc<Mesh> {
    let corners = [
        Vec3::new(-0.5, -0.5, -0.5),
        Vec3::new(0.5, -0.5, -0.5),
        Vec3::new(0.5, 0.5, -0.5),
        Vec3::new(-0.5, 0.5, -0.5),
        Vec3::new(-0.5, -0.5, 0.5),
        Vec3::new(0.5, -0.5, 0.5),
        Vec3::new(0.5, 0.5, 0.5),
        Vec3::new(-0.5, 0.5, 0.5),
    ];
    let vertices = corners
        .iter()
        .map(|&position| Vertex {
            position,
            normal: position.normalize(),
        })
        .collect();
    #[rustfmt::skip]
    let indices = vec![
        0, 1, 2, 0, 2, 3, // back
        4, 6, 5, 4, 7, 6, // front
        0, 3, 7, 0, 7, 4, // left
        1, 5, 6, 1, 6, 2, // right
        3, 2, 6, 3, 6, 7, // top
        0, 4, 5, 0, 5, 1, // bottom
    ];
    Arc::new(Mesh::new("cube", vertices, indices, Some(material)))
}

fn ground_mesh(material: Arc<Material>) -> Arc<Mesh> {
    let normal = Vec3::new(0.0, 1.0, 0.0);
    let vertices = [
        Vec3::new(-4.0, 0.0, -4.0),
        Vec3::new(4.0, 0.0, -4.0),
        Vec3::new(4.0, 0.0, 4.0),
        Vec3::new(-4.0, 0.0, 4.0),
    ]
    .into_iter()
    .map(|position| Vertex { position, normal })
    .collect();
    Arc::new(Mesh::new(
        "ground",
        vertices,
        vec![0, 2, 1, 0, 3, 2],
        Some(material),
    ))
}

fn build_scene(scene: &RenderScene) {
    let hull = Arc::new(Material {
        name: String::from("hull"),
        base_color: Vec4::new(0.9, 0.6, 0.2, 1.0),
        unlit: false,
    });
    let slate = Arc::new(Material {
        name: String::from("slate"),
        base_color: Vec4::new(0.3, 0.35, 0.4, 1.0),
        unlit: false,
    });
    scene.add_material(hull.clone());
    scene.add_material(slate.clone());

    let cube = Arc::new(Model::new("cube", vec![cube_mesh(hull)]));
    let ground = Arc::new(Model::new("ground", vec![ground_mesh(slate)]));
    scene.add_model(cube.clone());
    scene.add_model(ground.clone());

    let spinner = scene.add_model_ref(cube, Transform::from_position(Vec3::new(0.0, 0.5, 0.0)));
    scene.set_animation(
        &spinner,
        Some(SpinAnimation {
            axis: Vec3::new(0.0, 1.0, 0.0),
            radians_per_sec: 0.8,
        }),
    );
    scene.add_model_ref(ground, Transform::from_position(Vec3::new(0.0, -0.5, 0.0)));

    scene.add_light_ref(
        Arc::new(Light {
            name: String::from("sun"),
            color: Vec3::new(1.0, 0.95, 0.85),
            intensity: 0.9,
            kind: LightKind::Directional {
                direction: Vec3::new(-0.4, -1.0, 0.3).normalize(),
            },
        }),
        Transform::from_position(Vec3::new(0.0, 5.0, 0.0)),
    );

    scene.set_animation_playing(true);
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let mut settings = RendererSettings::default();
    settings.render_size = [TARGET_SIZE.0, TARGET_SIZE.1];
    settings.headless = true;

    let mut registry = BackendRegistry::new();
    registry.register(Box::new(SoftwareBackend::new(&settings)));

    let cmds = Arc::new(RenderCmdSystem::new());
    let mut system = RenderSystem::new(registry, cmds.clone(), settings);
    system.init()?;

    let scene = system.main_scene().expect("init allocates a scene").clone();
    build_scene(&scene);
    system.scene_load(&scene.scene_data());

    let system = Arc::new(Mutex::new(system));
    let running = Arc::new(AtomicBool::new(true));

    log::info!("Starting render thread");
    let render_system = Arc::clone(&system);
    let render_running = Arc::clone(&running);
    let render_thread = thread::spawn(move || {
        while render_running.load(Ordering::Acquire) {
            render_system.lock().unwrap().process_commands();
            thread::yield_now();
        }
        // Final drain so shutdown never races queued work
        render_system.lock().unwrap().process_commands();
    });

    for frame in 0..FRAMES {
        // Keep at most one whole frame buffered ahead of the render thread
        while cmds.pending_frames() >= 1 {
            thread::yield_now();
        }

        cmds.add_begin_frame_cmd();

        let config = *system.lock().unwrap().config();
        let dt_ms = if config.frametime > 0.0 {
            config.frametime
        } else {
            16.0
        };
        scene.update(dt_ms);
        scene.draw(&cmds, TARGET_SIZE, true);
        cmds.add_draw_ui_cmd(Box::new(UiConf {
            scene: scene.clone(),
            config,
            draw_info: None,
        }));
        cmds.add_end_frame_cmd();

        match frame {
            20 => {
                // Paint a stroke at the cube's top face
                let stroke = DrawInfo {
                    position_ws: Vec3::new(0.0, 1.0, 0.0),
                    radius: 0.3,
                    ..Default::default()
                };
                cmds.add_draw_on_mesh_cmd(&stroke);
            }
            40 => {
                log::info!("Switching to the tracer");
                system.lock().unwrap().change_backend_implementation("tracer");
            }
            80 => {
                let mut system = system.lock().unwrap();
                log::info!("Back to the rasterizer, then hot-reload");
                system.change_backend_implementation("forward");
                system.reload_backend_implementation();
            }
            100 => cmds.add_screenshot_cmd("viewer_frame"),
            _ => {}
        }
    }

    // Let the render thread finish everything that is queued
    while cmds.next_cmd() {
        thread::yield_now();
    }
    running.store(false, Ordering::Release);
    render_thread.join().expect("render thread panicked");

    let mut system = system.lock().unwrap();
    let stats = *system.config();
    log::info!(
        "Rendered {} frames, {:.1} fps smoothed",
        stats.frame_index,
        stats.framerate_smooth
    );
    system.shutdown();
    Ok(())
}
