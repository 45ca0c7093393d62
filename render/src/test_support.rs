use parley_shared::MapDescriptor;

/// Five-region map: `pic` has no supply center, `par` and `bre` do, `spa` is
/// coastal, `eng` is water.
pub fn descriptor() -> MapDescriptor {
    MapDescriptor::from_json(
        r##"{
            "name": "fixture",
            "regions": [
                {"name": "pic", "full_name": "Picardy",
                 "anchors": {"unit": {"x": 100, "y": 100}, "dislodged": {"x": 110, "y": 110}}},
                {"name": "par", "full_name": "Paris", "supply_center": true,
                 "anchors": {"unit": {"x": 200, "y": 200}, "dislodged": {"x": 210, "y": 210},
                             "supply_center": {"x": 190, "y": 190}}},
                {"name": "bre", "full_name": "Brest", "supply_center": true,
                 "anchors": {"unit": {"x": 50, "y": 200}, "dislodged": {"x": 60, "y": 210},
                             "supply_center": {"x": 40, "y": 190}}},
                {"name": "spa", "full_name": "Spain", "supply_center": true,
                 "anchors": {"unit": {"x": 300, "y": 400}, "dislodged": {"x": 310, "y": 410},
                             "supply_center": {"x": 290, "y": 390}},
                 "coasts": {"nc": {"unit": {"x": 280, "y": 350}},
                            "sc": {"unit": {"x": 320, "y": 450}}}},
                {"name": "eng", "full_name": "English Channel", "land": false,
                 "anchors": {"unit": {"x": 80, "y": 20}, "dislodged": {"x": 90, "y": 30}}}
            ],
            "factions": [
                {"id": "france", "color": "#3050f0"},
                {"id": "england", "color": "#c03040"},
                {"id": "germany"}
            ],
            "symbols": {
                "Army": {"width": 20, "height": 10},
                "Fleet": {"width": 30, "height": 10}
            },
            "order_drawing": {
                "move": {"stroke_width": 3.0, "marker": "arrow"},
                "support": {"stroke_width": 1.5, "dashed": true, "highlight_offset": 4.0},
                "convoy": {"stroke_width": 1.5, "filter": "glow"}
            },
            "labels": {"brief": true, "full": true}
        }"##,
    )
    .expect("fixture descriptor should parse")
}
