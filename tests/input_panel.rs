mod helpers;

use helpers::{find, int, object, uint, Placed, Placement, TestClient, TestServer};

use imbridge::{PanelPosition, PanelRole, Rect, SurfaceGeometry, SurfaceRef};
use imbridge_protocols::core::WL_OUTPUT_INTERFACE;

fn with_placement() -> (TestServer, Placement) {
    let mut server = TestServer::new();
    let placement = Placement::default();
    server.core.set_panel_placement(placement.clone());
    (server, placement)
}

/// A client with a v3 text input enabled with a cursor rectangle
fn typing(server: &mut TestServer, cursor: Rect) -> (TestClient, u32) {
    let mut app = server.add_client();
    let surface = app.surface();
    let text_input = app.text_input_v3();
    server.roundtrip(&mut app);
    server.focus(&app, Some(surface));
    app.request(text_input, "enable", vec![]);
    app.request(
        text_input,
        "set_cursor_rectangle",
        vec![int(cursor.x), int(cursor.y), int(cursor.width), int(cursor.height)],
    );
    app.request(text_input, "commit", vec![]);
    server.roundtrip(&mut app);
    (app, text_input)
}

#[test]
fn overlay_panel_follows_the_cursor() {
    let (mut server, placement) = with_placement();
    let mut ime = server.add_client();
    let input_panel = ime.input_panel_v1();
    let surface = ime.surface();
    let panel_surface = ime.create(input_panel, "get_input_panel_surface", vec![object(surface)]);
    server.roundtrip(&mut ime);
    // no role yet
    assert!(placement.take().is_empty());

    ime.request(panel_surface, "set_overlay_panel", vec![]);
    server.roundtrip(&mut ime);
    let record = match &placement.take()[..] {
        [Placed::Registered(record)] => record.clone(),
        other => panic!("unexpected placement calls {other:?}"),
    };
    assert_eq!(record.role, PanelRole::Overlay);
    assert_eq!(record.anchor, None);
    assert!(!record.mapped);
    assert_eq!(record.surface, server.surface(&ime, surface));

    let (_app, _) = typing(&mut server, Rect::new(10, 20, 1, 16));
    match &placement.take()[..] {
        [Placed::Updated(updated)] => {
            assert_eq!(updated.handle, record.handle);
            assert_eq!(updated.anchor, Some(Rect::new(10, 20, 1, 16)));
        }
        other => panic!("unexpected placement calls {other:?}"),
    }

    ime.map_surface(surface, true);
    server.roundtrip(&mut ime);
    match &placement.take()[..] {
        [Placed::Updated(updated)] => assert!(updated.mapped),
        other => panic!("unexpected placement calls {other:?}"),
    }
    assert_eq!(server.core.panels().count(), 1);

    ime.request(surface, "destroy", vec![]);
    server.roundtrip(&mut ime);
    assert_eq!(placement.take(), [Placed::Unregistered(record.handle)]);
    assert_eq!(server.core.panels().count(), 0);
}

#[test]
fn top_level_panel_stays_on_its_output() {
    let (mut server, placement) = with_placement();
    let mut ime = server.add_client();
    let input_panel = ime.input_panel_v1();
    let output = ime.bind(&WL_OUTPUT_INTERFACE, 1);
    let surface = ime.surface();
    let panel_surface = ime.create(input_panel, "get_input_panel_surface", vec![object(surface)]);
    ime.request(panel_surface, "set_toplevel", vec![object(output), uint(0)]);
    server.roundtrip(&mut ime);

    let output = server.output(&ime, output);
    match &placement.take()[..] {
        [Placed::Registered(record)] => {
            assert_eq!(
                record.role,
                PanelRole::TopLevel { output: output.clone(), position: PanelPosition::CenterBottom }
            );
            assert_eq!(record.output, Some(output));
            assert_eq!(record.anchor, None);
        }
        other => panic!("unexpected placement calls {other:?}"),
    }

    // the cursor does not move it
    let (_app, _) = typing(&mut server, Rect::new(1, 2, 3, 4));
    assert!(placement.take().is_empty());
}

#[test]
fn overlays_go_to_the_focused_output() {
    let (mut server, placement) = with_placement();
    let mut ime = server.add_client();
    let input_panel = ime.input_panel_v1();
    let output = ime.bind(&WL_OUTPUT_INTERFACE, 1);
    let surface = ime.surface();
    let panel_surface = ime.create(input_panel, "get_input_panel_surface", vec![object(surface)]);
    ime.request(panel_surface, "set_overlay_panel", vec![]);
    server.roundtrip(&mut ime);
    let _ = placement.take();

    let output = server.output(&ime, output);
    server.core.set_focused_output(server.backend.handle(), Some(output.clone()));
    match &placement.take()[..] {
        [Placed::Updated(record)] => assert_eq!(record.output, Some(output.clone())),
        other => panic!("unexpected placement calls {other:?}"),
    }
    assert_eq!(server.core.focused_output(), Some(&output));

    // same output, nothing to tell
    server.core.set_focused_output(server.backend.handle(), Some(output));
    assert!(placement.take().is_empty());
}

#[test]
fn popup_gets_the_cursor_rectangle() {
    let (mut server, placement) = with_placement();
    let mut ime = server.add_client();
    let im = ime.input_method_v2();
    let surface = ime.surface();
    let popup = ime.create(im, "get_input_popup_surface", vec![object(surface)]);
    server.roundtrip(&mut ime);
    match &placement.take()[..] {
        [Placed::Registered(record)] => assert_eq!(record.role, PanelRole::Overlay),
        other => panic!("unexpected placement calls {other:?}"),
    }
    // nothing to point at yet
    assert!(find(&ime.events(), popup, "text_input_rectangle").is_empty());

    let (mut app, text_input) = typing(&mut server, Rect::new(5, 6, 7, 8));
    let events = ime.events();
    let rectangle = find(&events, popup, "text_input_rectangle");
    assert_eq!(rectangle.len(), 1);
    assert_eq!(
        (rectangle[0].int(0), rectangle[0].int(1), rectangle[0].int(2), rectangle[0].int(3)),
        (5, 6, 7, 8)
    );

    // unchanged rectangle, no event
    app.request(text_input, "set_cursor_rectangle", vec![int(5), int(6), int(7), int(8)]);
    app.request(text_input, "commit", vec![]);
    server.roundtrip(&mut app);
    assert!(find(&ime.events(), popup, "text_input_rectangle").is_empty());

    app.request(text_input, "set_cursor_rectangle", vec![int(9), int(6), int(7), int(8)]);
    app.request(text_input, "commit", vec![]);
    server.roundtrip(&mut app);
    let events = ime.events();
    assert_eq!(find(&events, popup, "text_input_rectangle")[0].int(0), 9);

    // destroying the popup unregisters it
    ime.request(popup, "destroy", vec![]);
    server.roundtrip(&mut ime);
    assert!(matches!(&placement.take()[..], [.., Placed::Unregistered(_)]));
}

/// Every surface sits at the same offset on screen
struct Offset(i32, i32);

impl SurfaceGeometry for Offset {
    fn to_global(&self, _surface: &SurfaceRef, rect: Rect) -> Option<Rect> {
        Some(Rect::new(rect.x + self.0, rect.y + self.1, rect.width, rect.height))
    }
}

/// No surface is on screen
struct Hidden;

impl SurfaceGeometry for Hidden {
    fn to_global(&self, _surface: &SurfaceRef, _rect: Rect) -> Option<Rect> {
        None
    }
}

fn overlay_anchor(geometry: impl SurfaceGeometry + 'static) -> Option<Rect> {
    let (mut server, placement) = with_placement();
    server.core.set_surface_geometry(geometry);
    let mut ime = server.add_client();
    let input_panel = ime.input_panel_v1();
    let surface = ime.surface();
    let panel_surface = ime.create(input_panel, "get_input_panel_surface", vec![object(surface)]);
    ime.request(panel_surface, "set_overlay_panel", vec![]);
    server.roundtrip(&mut ime);
    let _ = typing(&mut server, Rect::new(10, 20, 1, 16));
    let _ = placement.take();
    let anchor = server.core.panels().next().and_then(|record| record.anchor);
    anchor
}

#[test]
fn anchor_in_global_coordinates() {
    assert_eq!(overlay_anchor(Offset(100, 50)), Some(Rect::new(110, 70, 1, 16)));
    assert_eq!(overlay_anchor(Hidden), None);
}
